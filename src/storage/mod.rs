pub mod layout;
pub mod file_lock;
pub mod kv_store;
pub mod error_report;
