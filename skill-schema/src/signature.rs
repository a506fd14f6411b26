//! Declared signatures of tool callables.

use serde::{Deserialize, Serialize};

use crate::declared::{DeclaredType, DescribeType};

/// One declared parameter of a callable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    name: String,
    ty: DeclaredType,
    has_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ParamSpec {
    /// Creates a parameter with an explicit declared type and no default.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: DeclaredType) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
            description: None,
        }
    }

    /// Creates a parameter whose declared type is taken from the Rust type `T`.
    ///
    /// `Option<T>` parameters are treated as having a default of `null`.
    #[must_use]
    pub fn of<T: DescribeType>(name: impl Into<String>) -> Self {
        let ty = T::declared_type();
        let has_default = ty.is_optional();
        Self {
            name: name.into(),
            ty,
            has_default,
            description: None,
        }
    }

    /// Marks the parameter as having a declared default.
    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn declared_type(&self) -> &DeclaredType {
        &self.ty
    }

    /// Whether the parameter declares a default value.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Declared signature of a callable: name, docs, ordered parameters and return type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    returns: Option<DeclaredType>,
}

impl Signature {
    /// Starts a signature for the named callable.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Sets the description shown to callers.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Appends a parameter typed from `T`.
    #[must_use]
    pub fn param_of<T: DescribeType>(self, name: impl Into<String>) -> Self {
        self.param(ParamSpec::of::<T>(name))
    }

    /// Sets the declared return type.
    #[must_use]
    pub fn returns(mut self, ty: DeclaredType) -> Self {
        self.returns = Some(ty);
        self
    }

    /// Sets the declared return type from `T`.
    #[must_use]
    pub fn returns_of<T: DescribeType>(self) -> Self {
        self.returns(T::declared_type())
    }

    /// Replaces the callable name, keeping everything else.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Callable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description text.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered parameters.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Declared return type, if any.
    #[must_use]
    pub fn return_type(&self) -> Option<&DeclaredType> {
        self.returns.as_ref()
    }
}
