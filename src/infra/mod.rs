pub mod audit_log_adapter;
pub mod in_memory_audit_store;

pub use audit_log_adapter::CsvAuditStore;
pub use in_memory_audit_store::InMemoryAuditStore;
