//! Error types for schema generation.

use thiserror::Error;

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors produced while turning a signature into a [`ToolSchema`](crate::ToolSchema).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A parameter's declared type has no JSON-compatible tag.
    #[error("parameter `{parameter}` of `{function}` has unresolvable type `{type_name}`")]
    UnresolvableParameter {
        /// Function owning the parameter.
        function: String,
        /// Offending parameter name.
        parameter: String,
        /// Declared type as written.
        type_name: String,
    },

    /// Two parameters share a name.
    #[error("parameter `{parameter}` of `{function}` is declared more than once")]
    DuplicateParameter {
        /// Function owning the parameter.
        function: String,
        /// Duplicated parameter name.
        parameter: String,
    },

    /// Tool or parameter name was empty.
    #[error("invalid name: {0}")]
    InvalidName(&'static str),
}
