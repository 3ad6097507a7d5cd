//! studio-crm: CRM back office (dashboard, overdue payments, domain pricing) with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
