//! Per-turn context assembly.

pub mod assembler;

pub use assembler::{ContextAssembler, ContextBundle, NO_DOCUMENTS, NO_RELEVANT_DOCUMENTS, format_passages};
