//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters (hosted REST backend, JSON snapshot, cache decorator).

use crate::domain::{
    Contact, Deal, DealPaymentUpdate, Domain, DomainError, Event, NewPayment, Payment, Task,
    TaskStatus,
};
use chrono::NaiveDate;
use std::fmt;

/// Backend tables the gateway reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Contacts,
    Deals,
    Payments,
    Events,
    Tasks,
    Domains,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Contacts,
        Table::Deals,
        Table::Payments,
        Table::Events,
        Table::Tasks,
        Table::Domains,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Contacts => "contacts",
            Table::Deals => "deals",
            Table::Payments => "payments",
            Table::Events => "events",
            Table::Tasks => "tasks",
            Table::Domains => "domains",
        }
    }

    /// Tables whose derived views go stale when this one is written.
    /// Payments embed their deal and deals carry the paid amount, so the two travel together.
    pub fn related(self) -> &'static [Table] {
        match self {
            Table::Payments | Table::Deals => &[Table::Payments, Table::Deals],
            Table::Contacts => &[Table::Contacts, Table::Deals, Table::Payments],
            Table::Events => &[Table::Events],
            Table::Tasks => &[Table::Tasks],
            Table::Domains => &[Table::Domains],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote data gateway. Full result sets, no pagination contract.
///
/// Errors are fetch failures (`Gateway`, `Auth`, `Decode`) and must never be
/// turned into empty results by implementations.
#[async_trait::async_trait]
pub trait DataGateway: Send + Sync {
    async fn list_contacts(&self) -> Result<Vec<Contact>, DomainError>;

    async fn list_deals(&self) -> Result<Vec<Deal>, DomainError>;

    /// All payments with their deal (and the deal's contact) and direct contact
    /// embedded, ascending by due date.
    async fn list_payments(&self) -> Result<Vec<Payment>, DomainError>;

    /// Payments due strictly before `today` and not paid, embedded like
    /// `list_payments`, ascending by due date.
    async fn list_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Payment>, DomainError>;

    async fn list_events(&self) -> Result<Vec<Event>, DomainError>;

    async fn list_tasks(&self) -> Result<Vec<Task>, DomainError>;

    async fn list_domains(&self) -> Result<Vec<Domain>, DomainError>;

    async fn count_contacts(&self) -> Result<u64, DomainError>;

    /// Deals whose workflow stage is absent or not "won"/"lost".
    async fn count_open_deals(&self) -> Result<u64, DomainError>;

    /// Payments whose status is not "paid".
    async fn count_pending_payments(&self) -> Result<u64, DomainError>;

    async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DomainError>;

    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>, DomainError>;

    /// Insert a payment and return the stored row.
    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, DomainError>;

    /// Patch a deal's settlement fields and return the updated row.
    async fn update_deal_payment(
        &self,
        deal_id: &str,
        update: &DealPaymentUpdate,
    ) -> Result<Deal, DomainError>;

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, DomainError>;
}
