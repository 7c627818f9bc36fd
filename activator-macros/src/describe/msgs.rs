// 统一的编译期错误文案

pub const ERR_TARGET: &str = "#[derive(Describe)] only supports structs with named fields";
pub const ERR_GENERICS: &str = "#[derive(Describe)] does not support generic types";
pub const ERR_UNKNOWN_CONTAINER: &str =
    "unknown describe option; expected namespace, name, module, default or implements(..)";
pub const ERR_UNKNOWN_FIELD: &str = "unknown describe option; expected skip, rename, read_only or collection";
pub const ERR_COLLECTION_TYPE: &str = "#[describe(collection)] requires a field of type Vec<E>";
pub const ERR_COLLECTION_READ_ONLY: &str = "collection and read_only cannot be combined";
