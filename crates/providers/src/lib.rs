//! Generation endpoint clients for FinanBot.
//!
//! All providers implement the `finanbot_core::Provider` trait. The router
//! builds the configured one.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, default_base_url, resolve_model};
