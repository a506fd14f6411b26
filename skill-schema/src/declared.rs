//! Declared parameter types and their JSON type tags.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-compatible type tag carried by a schema parameter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl TypeTag {
    /// Returns the tag as it appears in a JSON schema.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Rank used when a union has to be collapsed to one tag; lower wins.
    const fn union_rank(self) -> u8 {
        match self {
            Self::String => 0,
            Self::Integer => 1,
            Self::Number => 2,
            Self::Boolean => 3,
            Self::Array => 4,
            Self::Object => 5,
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter or return type as declared by a callable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum DeclaredType {
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean flag.
    Boolean,
    /// Homogeneous sequence; the element type is optional.
    Array(Option<Box<DeclaredType>>),
    /// Key/value mapping.
    Object,
    /// Value that may be absent.
    Optional(Box<DeclaredType>),
    /// One of several alternatives.
    Union(Vec<DeclaredType>),
    /// The unit/none type.
    Null,
    /// A type with no JSON mapping, kept verbatim for error reporting.
    Unknown(String),
}

/// Outcome of resolving a [`DeclaredType`] to schema tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub tag: TypeTag,
    pub items: Option<TypeTag>,
}

impl Resolved {
    const fn plain(tag: TypeTag) -> Self {
        Self { tag, items: None }
    }
}

impl DeclaredType {
    /// Array of the given element type.
    #[must_use]
    pub fn array_of(item: DeclaredType) -> Self {
        Self::Array(Some(Box::new(item)))
    }

    /// Optional wrapper around the given type.
    #[must_use]
    pub fn optional(inner: DeclaredType) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Returns `true` when the outermost type is [`DeclaredType::Optional`].
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Resolves the type strictly.
    ///
    /// Unknown types fail; unions never fail and fall back to `string` when no
    /// member resolves. On failure the unresolvable type name is returned.
    pub(crate) fn resolve(&self) -> Result<Resolved, String> {
        match self {
            Self::String => Ok(Resolved::plain(TypeTag::String)),
            Self::Integer => Ok(Resolved::plain(TypeTag::Integer)),
            Self::Number => Ok(Resolved::plain(TypeTag::Number)),
            Self::Boolean => Ok(Resolved::plain(TypeTag::Boolean)),
            Self::Object => Ok(Resolved::plain(TypeTag::Object)),
            Self::Null => Ok(Resolved::plain(TypeTag::String)),
            Self::Array(items) => {
                let items = match items {
                    Some(item) => Some(item.resolve()?.tag),
                    None => None,
                };
                Ok(Resolved {
                    tag: TypeTag::Array,
                    items,
                })
            }
            Self::Optional(inner) => inner.resolve(),
            Self::Union(members) => Ok(resolve_union(members)),
            Self::Unknown(name) => Err(name.clone()),
        }
    }

    /// Returns the tag this type resolves to, if any.
    #[must_use]
    pub fn tag(&self) -> Option<TypeTag> {
        self.resolve().ok().map(|resolved| resolved.tag)
    }
}

fn resolve_union(members: &[DeclaredType]) -> Resolved {
    let candidates: Vec<Resolved> = members
        .iter()
        .filter(|member| !matches!(member, DeclaredType::Null))
        .filter_map(|member| member.resolve().ok())
        .collect();

    let chosen = candidates
        .iter()
        .min_by_key(|resolved| resolved.tag.union_rank())
        .copied()
        .unwrap_or(Resolved::plain(TypeTag::String));

    if candidates.len() != 1 {
        tracing::debug!(
            members = members.len(),
            chosen = %chosen.tag,
            "union type collapsed by priority"
        );
    }
    chosen
}

impl Display for DeclaredType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Object => f.write_str("object"),
            Self::Null => f.write_str("null"),
            Self::Array(None) => f.write_str("array"),
            Self::Array(Some(item)) => write!(f, "array<{item}>"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Union(members) => {
                let rendered: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(" | "))
            }
            Self::Unknown(name) => f.write_str(name),
        }
    }
}

/// Maps a Rust type to the [`DeclaredType`] a tool parameter of that type has.
pub trait DescribeType {
    /// Returns the declared type.
    fn declared_type() -> DeclaredType;
}

macro_rules! describe {
    ($variant:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl DescribeType for $ty {
                fn declared_type() -> DeclaredType {
                    DeclaredType::$variant
                }
            }
        )+
    };
}

describe!(String => String, &str, char);
describe!(Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe!(Number => f32, f64);
describe!(Boolean => bool);
describe!(Object => Value, serde_json::Map<String, Value>);
describe!(Null => ());

impl<T: DescribeType> DescribeType for Option<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::optional(T::declared_type())
    }
}

impl<T: DescribeType> DescribeType for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::array_of(T::declared_type())
    }
}

impl<T: DescribeType> DescribeType for HashSet<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::array_of(T::declared_type())
    }
}

impl<T: DescribeType> DescribeType for BTreeSet<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::array_of(T::declared_type())
    }
}

impl<V> DescribeType for HashMap<String, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Object
    }
}

impl<V> DescribeType for BTreeMap<String, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_prefers_string_over_everything() {
        let union = DeclaredType::Union(vec![
            DeclaredType::Object,
            DeclaredType::Boolean,
            DeclaredType::String,
        ]);
        assert_eq!(union.tag(), Some(TypeTag::String));
    }

    #[test]
    fn union_orders_number_before_boolean_and_containers() {
        let union = DeclaredType::Union(vec![
            DeclaredType::Array(None),
            DeclaredType::Number,
            DeclaredType::Boolean,
        ]);
        assert_eq!(union.tag(), Some(TypeTag::Number));

        let union = DeclaredType::Union(vec![DeclaredType::Object, DeclaredType::Array(None)]);
        assert_eq!(union.tag(), Some(TypeTag::Array));
    }

    #[test]
    fn union_of_unknowns_falls_back_to_string() {
        let union = DeclaredType::Union(vec![
            DeclaredType::Unknown("Widget".into()),
            DeclaredType::Null,
        ]);
        assert_eq!(union.tag(), Some(TypeTag::String));
    }

    #[test]
    fn union_skips_unknown_members() {
        let union = DeclaredType::Union(vec![
            DeclaredType::Unknown("Widget".into()),
            DeclaredType::Boolean,
        ]);
        assert_eq!(union.tag(), Some(TypeTag::Boolean));
    }

    #[test]
    fn unknown_type_does_not_resolve() {
        assert_eq!(DeclaredType::Unknown("Widget".into()).tag(), None);
        assert_eq!(
            DeclaredType::array_of(DeclaredType::Unknown("Widget".into())).tag(),
            None
        );
    }

    #[test]
    fn describes_rust_types() {
        assert_eq!(i64::declared_type(), DeclaredType::Integer);
        assert_eq!(
            Option::<Vec<String>>::declared_type(),
            DeclaredType::optional(DeclaredType::array_of(DeclaredType::String))
        );
        assert_eq!(
            HashMap::<String, u8>::declared_type(),
            DeclaredType::Object
        );
    }
}
