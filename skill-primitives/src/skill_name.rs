//! Validated skill names.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 64;

/// Name of a skill directory.
///
/// Skill names double as tool-name prefixes and sandbox keys, so they are
/// restricted to lowercase ASCII alphanumerics and underscores and must not
/// start with a dot or underscore.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillName(String);

impl SkillName {
    /// Creates a new skill name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSkillName`] if the supplied name is empty, too
    /// long, starts with an underscore, or contains unsupported characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the skill name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SkillName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SkillName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SkillName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<SkillName> for String {
    fn from(value: SkillName) -> Self {
        value.0
    }
}

impl TryFrom<String> for SkillName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

fn validate(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidSkillName {
            name: name.into(),
            reason: reason.into(),
        })
    };

    if name.is_empty() {
        return reject("name cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidSkillName {
            name: name.into(),
            reason: format!("name length must be <= {MAX_NAME_LEN}"),
        });
    }
    if name.starts_with('_') {
        return reject("name cannot start with an underscore");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
    {
        return reject("name must contain lowercase alphanumerics or underscores");
    }

    Ok(())
}
