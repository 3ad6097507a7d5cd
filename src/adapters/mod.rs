//! Infrastructure adapters. Implement outbound ports.
//!
//! Backend gateways, CSV export, terminal UI. Map errors to DomainError.

pub mod export;
pub mod gateway;
pub mod ui;
