use syn::{punctuated::Punctuated, Attribute, Field, GenericArgument, LitStr, PathArguments, Token, Type};

use super::msgs::{ERR_COLLECTION_READ_ONLY, ERR_UNKNOWN_CONTAINER, ERR_UNKNOWN_FIELD};

#[derive(Default)]
pub struct ContainerOpts {
    pub namespace: Option<LitStr>,
    pub name: Option<LitStr>,
    pub module: Option<LitStr>,
    pub default: bool,
    pub implements: Vec<Type>,
}

#[derive(Default)]
pub struct FieldOpts {
    pub skip: bool,
    pub rename: Option<LitStr>,
    pub read_only: bool,
    pub collection: bool,
}

fn is_describe(a: &Attribute) -> bool {
    a.path().is_ident("describe")
}

pub fn parse_container(attrs: &[Attribute]) -> syn::Result<ContainerOpts> {
    let mut opts = ContainerOpts::default();
    for attr in attrs.iter().filter(|a| is_describe(a)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("namespace") {
                opts.namespace = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("name") {
                opts.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("module") {
                opts.module = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("default") {
                opts.default = true;
            } else if meta.path.is_ident("implements") {
                let content;
                syn::parenthesized!(content in meta.input);
                let roles = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
                opts.implements.extend(roles);
            } else {
                return Err(meta.error(ERR_UNKNOWN_CONTAINER));
            }
            Ok(())
        })?;
    }
    Ok(opts)
}

pub fn parse_field(field: &Field) -> syn::Result<FieldOpts> {
    let mut opts = FieldOpts::default();
    for attr in field.attrs.iter().filter(|a| is_describe(a)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                opts.skip = true;
            } else if meta.path.is_ident("rename") {
                opts.rename = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("read_only") {
                opts.read_only = true;
            } else if meta.path.is_ident("collection") {
                opts.collection = true;
            } else {
                return Err(meta.error(ERR_UNKNOWN_FIELD));
            }
            Ok(())
        })?;
        if opts.collection && opts.read_only {
            return Err(syn::Error::new_spanned(attr, ERR_COLLECTION_READ_ONLY));
        }
    }
    Ok(opts)
}

/// `E` for a field typed `Vec<E>` (any path ending in `Vec`).
pub fn vec_element(ty: &Type) -> Option<&Type> {
    let Type::Path(tp) = ty else {
        return None;
    };
    let last = tp.path.segments.last()?;
    if last.ident != "Vec" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(elem) if args.args.len() == 1 => Some(elem),
        _ => None,
    }
}
