//! The module every runtime starts with: framework roles and the built-in
//! streaming sources.
use std::sync::Arc;

use crate::{
    activation::ActivationProvider,
    adapter::AdapterFactory,
    module::Module,
    name::NamespaceUri,
    provider::{Metadata, ProviderRegistrationContext},
    streaming::{JsonStreamingSource, PropertiesStreamingSource, StreamingSource},
    template::Template,
    types::TypeDescriptor,
};

pub const CORE_MODULE: &str = "mmg.activator";
pub const CORE_NAMESPACE: &str = "urn:mmg-activator";

fn ns() -> NamespaceUri {
    NamespaceUri::new(CORE_NAMESPACE)
}

fn register(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_root_provider::<dyn AdapterFactory>()
        .define_root_provider::<dyn ActivationProvider>()
        .define_root_provider::<dyn Template>()
        .define_type_provider::<dyn StreamingSource, JsonStreamingSource>(
            ns().name("Json"),
            Metadata::new()
                .with("extension", "json")
                .with("content_type", "application/json"),
        )
        .define_type_provider::<dyn StreamingSource, PropertiesStreamingSource>(
            ns().name("Properties"),
            Metadata::new()
                .with("extension", "properties")
                .with("content_type", "text/x-java-properties"),
        );
    Ok(())
}

pub fn core_module() -> Module {
    Module::builder(CORE_MODULE)
        .type_descriptor(TypeDescriptor::role::<dyn AdapterFactory>(ns().name("AdapterFactory")).build())
        .type_descriptor(TypeDescriptor::role::<dyn ActivationProvider>(ns().name("ActivationProvider")).build())
        .type_descriptor(TypeDescriptor::role::<dyn Template>(ns().name("Template")).build())
        .type_descriptor(TypeDescriptor::role::<dyn StreamingSource>(ns().name("StreamingSource")).build())
        .type_descriptor(
            TypeDescriptor::builder::<JsonStreamingSource>(ns().name("JsonStreamingSource"))
                .default_constructor()
                .implements::<dyn StreamingSource>(|s| s as Arc<dyn StreamingSource>)
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::builder::<PropertiesStreamingSource>(ns().name("PropertiesStreamingSource"))
                .default_constructor()
                .implements::<dyn StreamingSource>(|s| s as Arc<dyn StreamingSource>)
                .build(),
        )
        .register(register)
        .build()
}
