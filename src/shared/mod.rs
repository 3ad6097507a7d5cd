//! Cross-cutting concerns shared by all layers.

pub mod config;

pub use config::AppConfig;
