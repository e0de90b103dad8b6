// Vestige - Trust and Knowledge Layer for Code Assistants
//!
//! Vestige keeps a code-assistant session honest: a semantic embedding index
//! with freshness tracking, a security gate in front of every path, content,
//! and query, a shadow-workspace validator for proposed edits, and a shared
//! session state store the planning layer reads its summaries from.

pub mod database;
pub mod embeddings;
pub mod errors;
pub mod extractors;
pub mod freshness;
pub mod gate;
pub mod index;
pub mod session;
pub mod shadow;
pub mod utils;
pub mod workspace;


// Re-export common types
pub use database::IndexSnapshot;
pub use errors::{Result, VestigeError};
pub use freshness::{IndexFreshness, StaleReason, check_freshness};
pub use gate::{SecurityGate, SecurityVerdict, Severity};
pub use index::{ElementHit, EmbeddingIndex, FileHit, IndexReport};
pub use session::SessionState;
pub use shadow::{DiagnosticProvider, Finding, ShadowValidationResult, ShadowValidator};
pub use workspace::{VestigeWorkspace, WorkspaceConfig};
