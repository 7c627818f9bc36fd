use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Field, Ident, LitStr};

use super::{
    msgs::ERR_COLLECTION_TYPE,
    parse::{parse_field, vec_element, ContainerOpts},
};

/// `.property(..)` call for one field, or nothing when skipped.
pub fn property_for(field: &Field) -> syn::Result<Option<TokenStream2>> {
    let opts = parse_field(field)?;
    if opts.skip {
        return Ok(None);
    }
    // 具名结构体的字段一定有标识符
    let Some(ident) = field.ident.as_ref() else {
        return Ok(None);
    };
    let name = opts
        .rename
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let ty = &field.ty;
    let prop = if opts.collection {
        let elem = vec_element(ty).ok_or_else(|| syn::Error::new_spanned(ty, ERR_COLLECTION_TYPE))?;
        quote! {
            ::mmg_activator::types::Property::collection::<Self, #elem>(
                #name,
                |t: &mut Self| &mut t.#ident,
                |t: &Self| &t.#ident,
            )
        }
    } else if opts.read_only {
        quote! {
            ::mmg_activator::types::Property::read_only::<Self, #ty>(#name, |t: &Self| t.#ident.clone())
        }
    } else {
        quote! {
            ::mmg_activator::types::Property::read_write::<Self, #ty>(
                #name,
                |t: &Self| t.#ident.clone(),
                |t: &mut Self, v: #ty| t.#ident = v,
            )
        }
    };
    Ok(Some(quote! { .property(#prop) }))
}

pub fn describe_impl(ident: &Ident, opts: &ContainerOpts, props: &[TokenStream2]) -> TokenStream2 {
    let namespace = opts
        .namespace
        .clone()
        .unwrap_or_else(|| LitStr::new("", ident.span()));
    let name = opts
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let default_ctor = opts.default.then(|| quote! { .default_constructor() });
    let module = opts.module.as_ref().map(|m| quote! { .module(#m) });
    let roles = opts.implements.iter().map(|role| {
        quote! {
            .implements::<#role>(|v| v as ::std::sync::Arc<#role>)
        }
    });
    quote! {
        impl ::mmg_activator::types::Describe for #ident {
            fn describe() -> ::mmg_activator::types::TypeDescriptor {
                ::mmg_activator::types::TypeDescriptor::builder::<Self>(
                    ::mmg_activator::name::QualifiedName::new(#namespace, #name),
                )
                #default_ctor
                #module
                #(#props)*
                #(#roles)*
                .build()
            }
        }
    }
}
