//! Augment the development of seismic primitives with procedural macros.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, AttributeArgs, ItemFn, Lit, Meta, NestedMeta};

/// Run a test function with a [tracing](https://docs.rs/tracing) subscriber installed for the
/// duration of the test.
///
/// Log output is captured by the test harness (and only printed for failing tests). The default
/// level is `DEBUG`; pass `level = "..."` to change it. The crate using this attribute must depend
/// on `tracing` and `tracing-subscriber`.
///
/// # Example
/// ```rust,ignore
/// use geoseis_macros::test_traced;
///
/// #[test_traced(level = "INFO")]
/// fn test_info_level() {
///     tracing::info!("this is printed");
///     tracing::debug!("this is not");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input = parse_macro_input!(item as ItemFn);

    // Parse the log level (if provided)
    let mut level = quote!(::tracing::Level::DEBUG);
    for arg in &args {
        match arg {
            NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("level") => {
                let Lit::Str(lit) = &nv.lit else {
                    return syn::Error::new_spanned(&nv.lit, "level must be a string literal")
                        .to_compile_error()
                        .into();
                };
                level = match parse_level(&lit.value()) {
                    Some(level) => level,
                    None => {
                        return syn::Error::new_spanned(lit, "invalid level")
                            .to_compile_error()
                            .into();
                    }
                };
            }
            other => {
                return syn::Error::new_spanned(other, "unsupported argument")
                    .to_compile_error()
                    .into();
            }
        }
    }

    let name = &input.sig.ident;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis fn #name() {
            let subscriber = ::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(#level)
                .with_line_number(true)
                .finish();
            let dispatcher = ::tracing::Dispatch::new(subscriber);
            ::tracing::dispatcher::with_default(&dispatcher, || #block);
        }
    };
    TokenStream::from(expanded)
}

fn parse_level(level: &str) -> Option<TokenStream2> {
    let level = match level.to_uppercase().as_str() {
        "TRACE" => quote!(::tracing::Level::TRACE),
        "DEBUG" => quote!(::tracing::Level::DEBUG),
        "INFO" => quote!(::tracing::Level::INFO),
        "WARN" => quote!(::tracing::Level::WARN),
        "ERROR" => quote!(::tracing::Level::ERROR),
        _ => return None,
    };
    Some(level)
}
