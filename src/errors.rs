//! Error Types
//!
//! The main error type [`EmberError`] covers all failure modes of the
//! pipeline core. Load-time and resize-time failures are unrecoverable and
//! propagate to the caller; per-frame failures are limited to the validated
//! conditions below — there are no retry semantics anywhere in this crate.

use thiserror::Error;

use crate::core::mesh::VertexSemantics;

/// The main error type for the Ember pipeline core.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // GPU Resource Errors
    // ========================================================================
    /// A GPU object could not be created. Fatal at startup/resize.
    #[error("Failed to create {what}: {detail}")]
    ResourceCreation {
        /// What was being created
        what: String,
        /// Underlying status detail
        detail: String,
    },

    // ========================================================================
    // Shader Load Errors
    // ========================================================================
    /// The WGSL source failed to parse.
    #[error("Shader parse error: {0}")]
    ShaderParse(String),

    /// The shader declares a layout this core does not support
    /// (more than one uniform block, an unrecognized stage, mixed bind
    /// groups, or an unknown vertex attribute name).
    #[error("Unsupported shader layout: {0}")]
    ShaderLayoutUnsupported(String),

    // ========================================================================
    // Parameter Binding Errors
    // ========================================================================
    /// A set/bind call named a field or resource slot absent from the
    /// target's catalog. Direct calls fail hard; name-keyed merges skip.
    #[error("Unknown parameter name: {0}")]
    UnknownParameterName(String),

    /// The byte payload does not match the field's declared size.
    #[error("Size mismatch for field '{name}': expected {expected} bytes, got {got}")]
    FieldSizeMismatch {
        /// The field name
        name: String,
        /// Declared field size
        expected: usize,
        /// Payload size
        got: usize,
    },

    /// A shader's declared texture or sampler slot has no bound resource
    /// at setup time.
    #[error("No resource bound for slot '{0}'")]
    MissingResourceBinding(String),

    // ========================================================================
    // Draw Errors
    // ========================================================================
    /// The mesh's streams do not cover the vertex attributes the shader
    /// requires. Checked before any GPU call is issued.
    #[error("Mesh streams {available:?} do not satisfy shader inputs {required:?}")]
    UnsatisfiedVertexInput {
        /// The shader's required semantics mask
        required: VertexSemantics,
        /// The union of the mesh's stream masks
        available: VertexSemantics,
    },
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
