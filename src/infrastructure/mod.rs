pub mod shadow_store;

pub use shadow_store::{shadow_key, FileShadowStore, MemoryShadowStore, ShadowStore};
