//! Application use cases. Orchestrate domain logic via ports.

pub mod dashboard_service;
pub mod payment_service;
pub mod pricing_service;
pub mod watcher_service;

pub use dashboard_service::DashboardService;
pub use payment_service::{PaymentReceipt, PaymentService};
pub use pricing_service::PricingService;
pub use watcher_service::{DashboardState, DashboardWatcher};
