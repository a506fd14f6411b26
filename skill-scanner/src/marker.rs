//! Recognition of the `#[tool]` marker attribute.

use std::time::Duration;

use serde::Serialize;
use syn::{Attribute, LitInt, Meta};

const MARKER: &str = "tool";

/// Options carried by a `#[tool]` marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ToolMarker {
    /// Set by `#[tool(sandboxed)]`.
    pub sandboxed: bool,
    /// Set by `#[tool(timeout = N)]`, in seconds.
    pub timeout: Option<Duration>,
}

impl ToolMarker {
    /// Returns `true` when `attr` is a tool marker (`tool` or any path ending in `tool`).
    #[must_use]
    pub fn is_marker(attr: &Attribute) -> bool {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == MARKER)
    }

    /// Extracts the marker from a function's attributes.
    ///
    /// Returns `Ok(None)` when the function is not tagged.
    ///
    /// # Errors
    ///
    /// Returns a spanned [`syn::Error`] when the marker carries an unknown
    /// option or a malformed timeout.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Option<Self>> {
        let Some(attr) = attrs.iter().find(|attr| Self::is_marker(attr)) else {
            return Ok(None);
        };

        let mut marker = Self::default();
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(Some(marker));
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("sandboxed") {
                marker.sandboxed = true;
                Ok(())
            } else if meta.path.is_ident("timeout") {
                let seconds: LitInt = meta.value()?.parse()?;
                let seconds = seconds.base10_parse::<u64>()?;
                if seconds == 0 {
                    return Err(meta.error("timeout must be greater than zero"));
                }
                marker.timeout = Some(Duration::from_secs(seconds));
                Ok(())
            } else {
                Err(meta.error("unsupported tool option; expected `sandboxed` or `timeout = N`"))
            }
        })?;

        Ok(Some(marker))
    }
}
