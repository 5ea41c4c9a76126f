//! Content filter: screens user input and model output against prohibited rules.
//!
//! Each direction owns an independent [`RuleSet`]: literal keywords checked
//! first, then regex patterns, both against the lowercased text and both in
//! declaration order. The first hit wins. Rule sets are compiled once and
//! shared read-only for the life of the process.

use finanbot_config::{RuleSetConfig, SafetyConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// ── Built-in rules ────────────────────────────────────────────────────────

const INPUT_KEYWORDS: &[&str] = &[
    // Fraud and illegal activity
    "hackear",
    "robar",
    "estafar",
    "defraudar",
    "falsificar",
    "lavar dinero",
    "lavado de dinero",
    "evadir impuestos",
    "evasión fiscal",
    "cuentas fantasma",
    "cuenta offshore ilegal",
    "piramide",
    "esquema ponzi",
    "clonar tarjeta",
    "skimming",
    "phishing",
    "fraude bancario",
    "transferencia ilegal",
    "suplantación de identidad",
    // Informal lending
    "préstamo gota a gota",
    "usura",
    "prestamista ilegal",
    "inversión piramidal",
    "multinivel fraudulento",
    // Third-party data
    "dame el pin",
    "contraseña de",
    "clave de",
    "datos de cuenta de otra persona",
    // Defamation and discrimination
    "mejor que [banco]",
    "peor banco",
    "banco fraudulento",
    "no dar crédito por",
    "discriminar por edad",
    "discriminar por género",
    // Attempts to rewrite the assistant's role
    "ignora las instrucciones",
    "eres ahora",
    "modo desarrollador",
    "prompt injection",
    "system prompt",
    "olvida tu rol",
];

const INPUT_PATTERNS: &[&str] = &[
    r"cu[ae]nta\s+de\s+\w+",
    r"clave\s+de\s+mi\s+(esposa|esposo|amigo|jefe)",
    r"c[oó]mo\s+(ocultar|esconder)\s+(ingresos|dinero|ganancias)",
    r"evitar\s+pagar\s+(impuestos|tributos)",
    r"transferir\s+sin\s+que\s+se\s+den\s+cuenta",
    r"sacar\s+dinero\s+de\s+cuenta\s+ajena",
];

const OUTPUT_KEYWORDS: &[&str] = &[
    // Unhelpful refusals
    "no puedo ayudarte",
    "no sé",
    "no tengo información",
    "fuera de mi alcance",
    "no es mi función",
    // Risky promises
    "garantizo que ganarás",
    "inversión sin riesgo",
    "dinero fácil",
    "nunca perderás",
    "rendimiento asegurado",
    // Leaked credentials
    "tu contraseña es",
    "tu pin es",
    "tu clave es",
    // Illegal advice
    "evade impuestos",
    "oculta ingresos",
    "lava dinero",
    "falsifica documentos",
    "miente en tu declaración",
    // Discrimination
    "por tu edad no",
    "por tu género no",
    "por tu raza no",
    // Unregulated products and offensive language
    "criptomoneda sin regulación",
    "inversión piramidal",
    "maldiciones",
    "groserías",
    "palabras ofensivas",
];

const OUTPUT_PATTERNS: &[&str] = &[
    r"(garantizo|aseguro|prometo)\s+que\s+(ganarás|nunca perderás)",
    r"rendimiento\s+(garantizado|asegurado|seguro)\s+del?\s+\d+%",
    r"(evita|evade|esquiva)\s+(impuestos|tributos|sbs)",
];

static BUILTIN_INPUT: LazyLock<RuleSet> = LazyLock::new(|| {
    RuleSet::new(RuleSetKind::Input, INPUT_KEYWORDS, INPUT_PATTERNS)
        .expect("valid built-in input rules")
});

static BUILTIN_OUTPUT: LazyLock<RuleSet> = LazyLock::new(|| {
    RuleSet::new(RuleSetKind::Output, OUTPUT_KEYWORDS, OUTPUT_PATTERNS)
        .expect("valid built-in output rules")
});

// ── Types ─────────────────────────────────────────────────────────────────

/// Which side of the exchange a rule set screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetKind {
    Input,
    Output,
}

impl std::fmt::Display for RuleSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// What kind of rule produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Keyword,
    Pattern,
    None,
}

/// Outcome of screening one text against one rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub blocked: bool,
    pub kind: MatchKind,
    /// The keyword or pattern source that fired.
    pub matched_value: Option<String>,
}

impl ScreeningResult {
    pub fn pass() -> Self {
        Self {
            blocked: false,
            kind: MatchKind::None,
            matched_value: None,
        }
    }

    fn hit(kind: MatchKind, value: &str) -> Self {
        Self {
            blocked: true,
            kind,
            matched_value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid {kind} filter pattern '{pattern}': {reason}")]
    InvalidPattern {
        kind: RuleSetKind,
        pattern: String,
        reason: String,
    },
}

/// An immutable, compiled set of keywords and patterns.
#[derive(Debug, Clone)]
pub struct RuleSet {
    kind: RuleSetKind,
    /// Stored lowercased; the original casing is never needed.
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl RuleSet {
    /// Compile a rule set. Fails on the first invalid pattern.
    pub fn new<K, P>(kind: RuleSetKind, keywords: &[K], patterns: &[P]) -> Result<Self, FilterError>
    where
        K: AsRef<str>,
        P: AsRef<str>,
    {
        let keywords = keywords
            .iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| FilterError::InvalidPattern {
                    kind,
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kind,
            keywords,
            patterns,
        })
    }

    /// The default rules for user messages.
    pub fn builtin_input() -> Self {
        BUILTIN_INPUT.clone()
    }

    /// The default rules for generated responses.
    pub fn builtin_output() -> Self {
        BUILTIN_OUTPUT.clone()
    }

    /// Built-in rules for `kind`, or the configured replacement if present.
    pub fn from_config(kind: RuleSetKind, config: Option<&RuleSetConfig>) -> Result<Self, FilterError> {
        match (config, kind) {
            (Some(rules), _) => Self::new(kind, rules.keywords.as_slice(), rules.patterns.as_slice()),
            (None, RuleSetKind::Input) => Ok(Self::builtin_input()),
            (None, RuleSetKind::Output) => Ok(Self::builtin_output()),
        }
    }

    pub fn kind(&self) -> RuleSetKind {
        self.kind
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Screen `text`. Keywords take precedence over patterns.
    pub fn screen(&self, text: &str) -> ScreeningResult {
        let lowered = text.to_lowercase();

        if let Some(keyword) = self.keywords.iter().find(|k| lowered.contains(k.as_str())) {
            return ScreeningResult::hit(MatchKind::Keyword, keyword);
        }

        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(&lowered)) {
            return ScreeningResult::hit(MatchKind::Pattern, pattern.as_str());
        }

        ScreeningResult::pass()
    }
}

/// Screen `text` against `rule_set`.
pub fn screen(text: &str, rule_set: &RuleSet) -> ScreeningResult {
    rule_set.screen(text)
}

/// Both directions of screening, built once at startup.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    input: RuleSet,
    output: RuleSet,
}

impl ContentFilter {
    pub fn new(input: RuleSet, output: RuleSet) -> Self {
        Self { input, output }
    }

    /// Build from the `[safety]` section; absent overrides keep the built-ins.
    pub fn from_config(config: &SafetyConfig) -> Result<Self, FilterError> {
        let input = RuleSet::from_config(RuleSetKind::Input, config.input.as_ref())?;
        let output = RuleSet::from_config(RuleSetKind::Output, config.output.as_ref())?;
        tracing::debug!(
            input_keywords = input.keyword_count(),
            input_patterns = input.pattern_count(),
            output_keywords = output.keyword_count(),
            output_patterns = output.pattern_count(),
            "Content filter ready"
        );
        Ok(Self { input, output })
    }

    pub fn screen_input(&self, text: &str) -> ScreeningResult {
        self.input.screen(text)
    }

    pub fn screen_output(&self, text: &str) -> ScreeningResult {
        self.output.screen(text)
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(RuleSet::builtin_input(), RuleSet::builtin_output())
    }
}
