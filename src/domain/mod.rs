//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod pricing;
pub mod stats;

pub use entities::{
    Contact, Deal, DealPaymentUpdate, Domain, Event, EventStatus, NewPayment, Payment,
    PaymentStatus, PricingType, Task, TaskPriority, TaskStatus,
};
pub use errors::DomainError;
pub use pricing::{PricingResult, PricingStatus, resolve_price, resolve_prices, total_price};
pub use stats::{
    DashboardInput, DashboardStats, OverdueIndicator, OverduePayment, StageCount,
    compute_dashboard_stats, compute_overdue_payments, count_open_deals, count_pending_payments,
};
