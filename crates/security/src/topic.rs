//! Heuristic check that a message is about personal finance.

use serde::{Deserialize, Serialize};

const FINANCIAL_KEYWORDS: &[&str] = &[
    "préstamo",
    "crédito",
    "ahorro",
    "inversión",
    "banco",
    "cuenta",
    "tarjeta",
    "tasa",
    "interés",
    "deuda",
    "plazo fijo",
    "hipoteca",
    "seguro",
    "tcea",
    "trea",
    "cts",
    "afp",
    "fondos",
    "dinero",
    "soles",
    "dólares",
    "financiero",
    "económico",
    "presupuesto",
];

/// Messages shorter than this many words are always accepted (greetings, follow-ups).
const MIN_WORDS_TO_CHECK: usize = 3;

pub const OFF_TOPIC_REASON: &str = "La consulta no parece estar relacionada con finanzas.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

/// Accept short messages and any message mentioning a financial term.
pub fn validate_financial_context(message: &str) -> TopicCheck {
    if message.split_whitespace().count() < MIN_WORDS_TO_CHECK {
        return TopicCheck {
            valid: true,
            reason: None,
        };
    }

    let lowered = message.to_lowercase();
    if FINANCIAL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        TopicCheck {
            valid: true,
            reason: None,
        }
    } else {
        TopicCheck {
            valid: false,
            reason: Some(OFF_TOPIC_REASON.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_valid() {
        assert!(validate_financial_context("hola").valid);
        assert!(validate_financial_context("cuéntame chistes").valid);
        assert!(validate_financial_context("").valid);
    }

    #[test]
    fn financial_terms_are_valid() {
        assert!(validate_financial_context("¿Cuál es la TCEA de este préstamo?").valid);
        assert!(validate_financial_context("Quiero abrir un Plazo Fijo en soles").valid);
    }

    #[test]
    fn unrelated_long_message_is_rejected() {
        let check = validate_financial_context("¿Quién ganó el partido de fútbol ayer?");
        assert!(!check.valid);
        assert_eq!(check.reason.as_deref(), Some(OFF_TOPIC_REASON));
    }
}
