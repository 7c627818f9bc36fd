use proc_macro::TokenStream;

mod describe;

/// Generates a `Describe` impl: one property per named field, plus the
/// container options below.
///
/// ```ignore
/// #[derive(Clone, Default, Describe)]
/// #[describe(namespace = "urn:app", name = "Widget", default, implements(dyn Shape))]
/// struct Widget {
///     title: String,
///     #[describe(collection)]
///     tags: Vec<String>,
///     #[describe(read_only)]
///     id: u32,
///     #[describe(skip)]
///     cache: Option<String>,
/// }
/// ```
///
/// Field options: `skip`, `rename = "..."`, `read_only`, `collection`
/// (the field must be a `Vec<E>`). Property fields must be `Clone`.
#[proc_macro_derive(Describe, attributes(describe))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    describe::entrypoint(input)
}
