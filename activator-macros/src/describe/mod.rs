mod emit;
mod msgs;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use emit::{describe_impl, property_for};
use msgs::{ERR_GENERICS, ERR_TARGET};
use parse::parse_container;

pub fn entrypoint(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&input.generics, ERR_GENERICS));
    }
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => return Err(syn::Error::new_spanned(&input.ident, ERR_TARGET)),
        },
        _ => return Err(syn::Error::new_spanned(&input.ident, ERR_TARGET)),
    };
    let opts = parse_container(&input.attrs)?;
    // 收集所有字段错误后一并报告
    let mut props = Vec::new();
    let mut errors: Option<syn::Error> = None;
    for field in fields {
        match property_for(field) {
            Ok(Some(p)) => props.push(p),
            Ok(None) => {}
            Err(e) => match errors.as_mut() {
                Some(acc) => acc.combine(e),
                None => errors = Some(e),
            },
        }
    }
    if let Some(e) = errors {
        return Err(e);
    }
    Ok(describe_impl(&input.ident, &opts, &props))
}
