pub mod source_registry;

pub use source_registry::SourceRegistry;
