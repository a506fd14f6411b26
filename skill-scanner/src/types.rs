//! Syntactic mapping from Rust types to declared JSON types.

use quote::ToTokens;
use skill_schema::DeclaredType;
use syn::{GenericArgument, PathArguments, Type, TypePath};

/// Maps a Rust type, as written, to its [`DeclaredType`].
///
/// Resolution is purely syntactic: the last path segment decides, so
/// `std::collections::HashMap<String, u8>` and `HashMap<String, u8>` map alike.
/// Types with no JSON counterpart become [`DeclaredType::Unknown`].
#[must_use]
pub fn map_type(ty: &Type) -> DeclaredType {
    match ty {
        Type::Reference(reference) => map_type(&reference.elem),
        Type::Paren(inner) => map_type(&inner.elem),
        Type::Group(inner) => map_type(&inner.elem),
        Type::Slice(slice) => DeclaredType::array_of(map_type(&slice.elem)),
        Type::Array(array) => DeclaredType::array_of(map_type(&array.elem)),
        Type::Tuple(tuple) => match tuple.elems.first() {
            None => DeclaredType::Null,
            Some(first) => DeclaredType::array_of(map_type(first)),
        },
        Type::Path(path) => map_path(path),
        other => DeclaredType::Unknown(render(other)),
    }
}

fn map_path(path: &TypePath) -> DeclaredType {
    let Some(segment) = path.path.segments.last() else {
        return DeclaredType::Unknown(render_path(path));
    };
    let args = generic_types(&segment.arguments);
    let first = || args.first().map(|ty| map_type(ty));

    match segment.ident.to_string().as_str() {
        "String" | "str" | "char" | "PathBuf" | "Path" => DeclaredType::String,
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => DeclaredType::Integer,
        "f32" | "f64" => DeclaredType::Number,
        "bool" => DeclaredType::Boolean,
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => match first() {
            Some(item) => DeclaredType::array_of(item),
            None => DeclaredType::Array(None),
        },
        "HashMap" | "BTreeMap" | "Map" | "Value" => DeclaredType::Object,
        "Option" => match first() {
            Some(inner) => DeclaredType::optional(inner),
            None => DeclaredType::Unknown(render_path(path)),
        },
        "Either" => DeclaredType::Union(args.iter().map(|ty| map_type(ty)).collect()),
        "Box" | "Rc" | "Arc" | "Cow" => {
            first().unwrap_or_else(|| DeclaredType::Unknown(render_path(path)))
        }
        _ => DeclaredType::Unknown(render_path(path)),
    }
}

/// Returns the type arguments of `Result<T, E>` when `ty` is a `Result`.
pub(crate) fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    generic_types(&segment.arguments).into_iter().next()
}

fn generic_types(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(bracketed) => bracketed
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn render_path(path: &TypePath) -> String {
    tidy(&path.to_token_stream().to_string())
}

/// Renders a type the way it would be written by hand.
pub(crate) fn render(ty: &impl ToTokens) -> String {
    tidy(&ty.to_token_stream().to_string())
}

fn tidy(tokens: &str) -> String {
    tokens
        .replace(" < ", "<")
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace("& ", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(src: &str) -> DeclaredType {
        map_type(&syn::parse_str::<Type>(src).expect("type"))
    }

    #[test]
    fn primitives() {
        assert_eq!(map("String"), DeclaredType::String);
        assert_eq!(map("&str"), DeclaredType::String);
        assert_eq!(map("u64"), DeclaredType::Integer);
        assert_eq!(map("f32"), DeclaredType::Number);
        assert_eq!(map("bool"), DeclaredType::Boolean);
        assert_eq!(map("()"), DeclaredType::Null);
    }

    #[test]
    fn containers() {
        assert_eq!(map("Vec<i32>"), DeclaredType::array_of(DeclaredType::Integer));
        assert_eq!(map("&[String]"), DeclaredType::array_of(DeclaredType::String));
        assert_eq!(map("std::collections::HashMap<String, u8>"), DeclaredType::Object);
        assert_eq!(map("serde_json::Value"), DeclaredType::Object);
        assert_eq!(
            map("Option<Vec<bool>>"),
            DeclaredType::optional(DeclaredType::array_of(DeclaredType::Boolean))
        );
    }

    #[test]
    fn either_becomes_union() {
        assert_eq!(
            map("Either<i64, String>"),
            DeclaredType::Union(vec![DeclaredType::Integer, DeclaredType::String])
        );
    }

    #[test]
    fn unknown_types_keep_their_spelling() {
        assert_eq!(map("Widget"), DeclaredType::Unknown("Widget".into()));
        assert_eq!(
            map("Vec<crate::Widget>"),
            DeclaredType::array_of(DeclaredType::Unknown("crate::Widget".into()))
        );
    }

    #[test]
    fn result_ok_type_is_extracted() {
        let ty: Type = syn::parse_str("Result<Vec<u8>, String>").unwrap();
        let ok = result_ok_type(&ty).expect("ok type");
        assert_eq!(map_type(ok), DeclaredType::array_of(DeclaredType::Integer));
        let ty: Type = syn::parse_str("Vec<u8>").unwrap();
        assert!(result_ok_type(&ty).is_none());
    }
}
