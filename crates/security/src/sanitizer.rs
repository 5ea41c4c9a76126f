//! Data sanitizer: masks payment data before a message goes anywhere else.
//!
//! Three rules run in a fixed order: card numbers, then long digit runs
//! (account numbers), then security codes. The order matters because a
//! 16-digit card would otherwise be swallowed by the account rule.

use regex::Regex;
use std::sync::LazyLock;

static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b").expect("valid card regex")
});

// Over-inclusive on purpose: any 10-20 digit run is treated as an account number.
static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{10,20}\b").expect("valid account regex"));

static CVV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(cvv|código|code|cvc)[\s:]+\d{3,4}").expect("valid cvv regex")
});

pub const CARD_MASK: &str = "[TARJETA-OCULTA]";
pub const ACCOUNT_MASK: &str = "[CUENTA-OCULTA]";
pub const CODE_MASK: &str = "[OCULTO]";

/// Mask card numbers, account numbers, and CVV-like codes.
///
/// Pure and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let masked = CARD_RE.replace_all(text, CARD_MASK);
    let masked = ACCOUNT_RE.replace_all(&masked, ACCOUNT_MASK);
    let masked = CVV_RE.replace_all(&masked, format!("${{1}}: {CODE_MASK}").as_str());
    masked.into_owned()
}
