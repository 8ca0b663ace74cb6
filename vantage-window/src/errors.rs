//! Error types for draw layer operations.

use thiserror::Error;

use crate::projection::LutRole;

/// Errors surfaced synchronously by layer configuration and typed access.
/// Per-event problems in handlers are recovered locally and never show up
/// here.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Lookup table projection is missing its {0} buffer")]
    MissingLutBuffer(LutRole),

    #[error("Lookup table {role} buffer has {actual} channels, expected {expected}")]
    LutChannels {
        role: LutRole,
        expected: u32,
        actual: u32,
    },

    #[error("Renderable type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
