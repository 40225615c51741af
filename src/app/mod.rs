// Application-level seams between the pipeline and its storage backends
pub mod ports;

pub use ports::AuditStore;
