pub mod config;
pub mod manager;

pub use config::{ClientConfig, StoreConfig};
pub use manager::ConnectionManager;
