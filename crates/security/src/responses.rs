//! Disclaimers shown in place of a blocked message or response.
//!
//! One entry is chosen uniformly at random per block. The choice goes
//! through [`ResponsePicker`] so tests can fix it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

/// Prefix for every user-facing notice.
pub const NOTICE_PREFIX: &str = "⚠️ ";

pub const INPUT_BLOCKED_RESPONSES: [&str; 6] = [
    "Lo siento, no puedo asistirte con ese tipo de consultas. Mi función es brindarte asesoría financiera ética y legal.",
    "Esa solicitud está fuera del alcance de mi asesoría. Si necesitas ayuda con productos financieros legales, estaré encantado de ayudarte.",
    "No puedo procesar consultas que involucren actividades ilegales o no éticas. ¿Puedo ayudarte con algo más relacionado a finanzas personales?",
    "Mi rol es asesorar en finanzas de manera responsable. Esa consulta no es apropiada. ¿Tienes alguna otra pregunta sobre productos bancarios?",
    "Disculpa, no puedo responder a eso. Estoy aquí para ayudarte con decisiones financieras legales y éticas.",
    "Por políticas de seguridad y ética, no puedo ayudarte con esa consulta. ¿Necesitas información sobre cuentas de ahorro o préstamos?",
];

pub const OUTPUT_BLOCKED_RESPONSES: [&str; 4] = [
    "Disculpa, mi respuesta anterior no cumplió con los estándares de seguridad. Por favor, reformula tu pregunta y con gusto te ayudaré.",
    "Lo siento, detecté un error en mi respuesta. ¿Podrías replantear tu consulta de otra manera?",
    "Por seguridad, no puedo completar esa respuesta. ¿Hay algo más en lo que pueda ayudarte?",
    "Mi respuesta no pasó los filtros de seguridad. Intentemos de nuevo con una pregunta diferente.",
];

pub const OFF_TOPIC_RESPONSE: &str = "🤔 Parece que tu consulta no está relacionada con finanzas. Soy un asesor financiero especializado. ¿Puedo ayudarte con temas de ahorro, inversión, préstamos o productos bancarios?";

pub const GENERATION_FAILED_RESPONSE: &str =
    "Lo siento, ocurrió un problema al generar la respuesta. Por favor, inténtalo de nuevo.";

/// Chooses an index in `0..len`.
pub trait ResponsePicker: Send + Sync {
    fn pick(&self, len: usize) -> usize;
}

/// Uniform random choice backed by a seedable generator.
pub struct RandomPicker {
    rng: Mutex<StdRng>,
}

impl RandomPicker {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponsePicker for RandomPicker {
    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(0..len)
    }
}

/// Always returns the same index (wrapped to `len`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPicker(pub usize);

impl ResponsePicker for FixedPicker {
    fn pick(&self, len: usize) -> usize {
        if len == 0 { 0 } else { self.0 % len }
    }
}

/// Produces the prefixed notices emitted by the orchestrator.
#[derive(Clone)]
pub struct BlockedResponses {
    picker: Arc<dyn ResponsePicker>,
}

impl BlockedResponses {
    pub fn new(picker: Arc<dyn ResponsePicker>) -> Self {
        Self { picker }
    }

    fn choose(&self, set: &[&str]) -> String {
        let idx = self.picker.pick(set.len()).min(set.len().saturating_sub(1));
        format!("{NOTICE_PREFIX}{}", set[idx])
    }

    pub fn input_blocked(&self) -> String {
        self.choose(&INPUT_BLOCKED_RESPONSES)
    }

    pub fn output_blocked(&self) -> String {
        self.choose(&OUTPUT_BLOCKED_RESPONSES)
    }

    pub fn off_topic(&self) -> String {
        OFF_TOPIC_RESPONSE.to_string()
    }

    pub fn generation_failed(&self) -> String {
        format!("{NOTICE_PREFIX}{GENERATION_FAILED_RESPONSE}")
    }
}

impl Default for BlockedResponses {
    fn default() -> Self {
        Self::new(Arc::new(RandomPicker::new()))
    }
}

impl std::fmt::Debug for BlockedResponses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockedResponses").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_picker_selects_entry() {
        let responses = BlockedResponses::new(Arc::new(FixedPicker(2)));
        assert_eq!(
            responses.input_blocked(),
            format!("⚠️ {}", INPUT_BLOCKED_RESPONSES[2])
        );
        assert_eq!(
            responses.output_blocked(),
            format!("⚠️ {}", OUTPUT_BLOCKED_RESPONSES[2])
        );
    }

    #[test]
    fn fixed_picker_wraps() {
        let responses = BlockedResponses::new(Arc::new(FixedPicker(7)));
        // 7 % 4 == 3
        assert!(responses.output_blocked().ends_with(OUTPUT_BLOCKED_RESPONSES[3]));
    }

    #[test]
    fn seeded_picker_is_reproducible() {
        let a = RandomPicker::seeded(42);
        let b = RandomPicker::seeded(42);
        let seq_a: Vec<usize> = (0..20).map(|_| a.pick(6)).collect();
        let seq_b: Vec<usize> = (0..20).map(|_| b.pick(6)).collect();
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.iter().all(|&i| i < 6));
    }

    #[test]
    fn random_picker_covers_the_set() {
        let picker = RandomPicker::seeded(7);
        let mut seen = [false; 4];
        for _ in 0..500 {
            seen[picker.pick(4)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn every_notice_is_prefixed() {
        let responses = BlockedResponses::default();
        assert!(responses.input_blocked().starts_with(NOTICE_PREFIX));
        assert!(responses.output_blocked().starts_with(NOTICE_PREFIX));
        assert!(responses.generation_failed().starts_with(NOTICE_PREFIX));
    }
}
