//! Safety layer for FinanBot: content screening, data masking, and audit logging.
//!
//! Provides:
//! - **Filter**: Input and output rule sets (keywords + regex patterns)
//! - **Sanitizer**: Masks card numbers, account numbers, and security codes
//! - **Audit logging**: Structured records of every blocked message
//! - **Responses**: Disclaimer sets with an injectable random picker
//! - **Topic**: Heuristic check that a message is finance-related

pub mod audit;
pub mod filter;
pub mod responses;
pub mod sanitizer;
pub mod topic;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditSink, TracingSink, excerpt};
pub use filter::{ContentFilter, FilterError, MatchKind, RuleSet, RuleSetKind, ScreeningResult, screen};
pub use responses::{BlockedResponses, FixedPicker, RandomPicker, ResponsePicker};
pub use sanitizer::sanitize;
pub use topic::{TopicCheck, validate_financial_context};
