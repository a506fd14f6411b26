//! The `#[tool]` marker for skill entry points.
//!
//! The attribute leaves the function untouched. Discovery happens statically:
//! the skill scanner reads the marker from source without compiling the skill.
//! Expanding it here only validates the options so that a skill which compiles
//! also scans cleanly.

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{ItemFn, LitInt, parse_macro_input};

/// Marks a free function as a tool entry point of its skill.
///
/// Accepted forms:
///
/// * `#[tool]`
/// * `#[tool(sandboxed)]`: the function runs inside an isolated session
/// * `#[tool(timeout = 10)]`: overrides the call deadline, in seconds
///
/// Options may be combined: `#[tool(sandboxed, timeout = 10)]`.
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("sandboxed") {
            Ok(())
        } else if meta.path.is_ident("timeout") {
            let seconds: LitInt = meta.value()?.parse()?;
            if seconds.base10_parse::<u64>()? == 0 {
                return Err(meta.error("timeout must be greater than zero"));
            }
            Ok(())
        } else {
            Err(meta.error("unsupported tool option; expected `sandboxed` or `timeout = N`"))
        }
    });
    parse_macro_input!(attr with parser);

    let function = parse_macro_input!(item as ItemFn);
    if let Some(receiver) = function.sig.receiver() {
        return syn::Error::new_spanned(receiver, "tools must be free functions")
            .to_compile_error()
            .into();
    }

    function.into_token_stream().into()
}
