//! Call-schema synthesis for tool functions.
//!
//! A tool's declared signature is described as data ([`Signature`]) rather than
//! obtained through runtime reflection. [`generate_schema`] turns that
//! description into a serializable [`ToolSchema`]. Host code can describe
//! parameters from Rust types through [`DescribeType`]; the skill scanner builds
//! the same structures from source text.

#![warn(missing_docs, clippy::pedantic)]

mod declared;
mod error;
mod schema;
mod signature;

pub use declared::{DeclaredType, DescribeType, TypeTag};
pub use error::{SchemaError, SchemaResult};
pub use schema::{SchemaParam, ToolSchema, generate_schema};
pub use signature::{ParamSpec, Signature};
