pub mod core;
pub mod render;
pub mod scraping;

// --- Primary core exports ---
pub use crate::core::config;
pub use crate::core::types;
pub use crate::core::types::{Iin, LookupError, RawTable, RecordSet};

// --- Registry client surface ---
pub use scraping::registry;
pub use scraping::registry::RegistryClient;
