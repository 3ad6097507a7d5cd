//! Implements DataGateway over a JSON snapshot of all tables.
//!
//! Used offline (exported data, demos) and as the in-memory gateway in tests.
//! Relations are embedded on read the same way the REST gateway's `select` does.

use crate::domain::{
    Contact, Deal, DealPaymentUpdate, Domain, DomainError, Event, NewPayment, Payment, Task,
    TaskStatus, count_open_deals, count_pending_payments,
};
use crate::ports::DataGateway;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Every table the application reads, as plain rows (no embedded relations).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

impl Snapshot {
    fn contact(&self, id: Option<&str>) -> Option<Contact> {
        let id = id?;
        self.contacts.iter().find(|c| c.id == id).cloned()
    }

    fn deal_with_contact(&self, deal: &Deal) -> Deal {
        let mut deal = deal.clone();
        if deal.contact.is_none() {
            deal.contact = self.contact(deal.contact_id.as_deref());
        }
        deal
    }

    fn payment_embedded(&self, payment: &Payment) -> Payment {
        let mut payment = payment.clone();
        if payment.deal.is_none() {
            payment.deal = payment
                .deal_id
                .as_deref()
                .and_then(|id| self.deals.iter().find(|d| d.id == id))
                .map(|d| self.deal_with_contact(d));
        }
        if payment.contact.is_none() {
            payment.contact = self.contact(payment.contact_id.as_deref());
        }
        payment
    }

    /// Embedded payments, ascending by due date, undated last.
    fn payments_by_due_date<'a>(&self, rows: impl Iterator<Item = &'a Payment>) -> Vec<Payment> {
        let mut payments: Vec<Payment> = rows.map(|p| self.payment_embedded(p)).collect();
        payments.sort_by_key(|p| {
            let due = p.due_on();
            (due.is_none(), due)
        });
        payments
    }
}

/// First `{prefix}-{n}` not already taken.
fn next_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut n = 1usize;
    loop {
        let candidate = format!("{}-{}", prefix, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Snapshot gateway. Optionally backed by a file; writes are persisted atomically.
pub struct SnapshotGateway {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
}

impl SnapshotGateway {
    /// Gateway over a JSON file. Call `load` before use.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            data: RwLock::new(Snapshot::default()),
        }
    }

    /// Gateway over in-memory rows; writes are kept in memory only.
    pub fn in_memory(snapshot: Snapshot) -> Self {
        Self {
            path: None,
            data: RwLock::new(snapshot),
        }
    }

    /// Load the snapshot from disk. A missing file is an empty snapshot; an
    /// unreadable or malformed file is an error, never silently empty.
    pub async fn load(&self) -> Result<(), DomainError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data: Snapshot = match fs::read_to_string(path).await {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| DomainError::Decode(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "snapshot file not found, starting empty");
                Snapshot::default()
            }
            Err(e) => {
                return Err(DomainError::Gateway(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        info!(
            path = %path.display(),
            contacts = data.contacts.len(),
            deals = data.deals.len(),
            payments = data.payments.len(),
            "snapshot loaded"
        );
        *self.data.write().await = data;
        Ok(())
    }

    /// Apply `change` to a copy of the snapshot, persist the copy, and only
    /// then replace the in-memory data. A failed change or save leaves both
    /// memory and file as they were. The write lock is held throughout so
    /// concurrent writes cannot lose each other's updates.
    async fn commit<R>(
        &self,
        change: impl FnOnce(&mut Snapshot) -> Result<R, DomainError>,
    ) -> Result<R, DomainError> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.save(&next).await?;
        *data = next;
        Ok(out)
    }

    /// Write to a temp file, sync, then rename over the target.
    async fn save(&self, data: &Snapshot) -> Result<(), DomainError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| DomainError::Gateway(format!("serialize snapshot: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Gateway(format!("create snapshot dir: {}", e)))?;
        }
        let temp_path = path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Gateway(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Gateway(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Gateway(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| DomainError::Gateway(format!("atomic rename failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataGateway for SnapshotGateway {
    async fn list_contacts(&self) -> Result<Vec<Contact>, DomainError> {
        Ok(self.data.read().await.contacts.clone())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, DomainError> {
        let data = self.data.read().await;
        Ok(data.deals.iter().map(|d| data.deal_with_contact(d)).collect())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, DomainError> {
        let data = self.data.read().await;
        Ok(data.payments_by_due_date(data.payments.iter()))
    }

    async fn list_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Payment>, DomainError> {
        let data = self.data.read().await;
        Ok(data.payments_by_due_date(data.payments.iter().filter(|p| p.is_overdue(today))))
    }

    async fn list_events(&self) -> Result<Vec<Event>, DomainError> {
        Ok(self.data.read().await.events.clone())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, DomainError> {
        Ok(self.data.read().await.tasks.clone())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, DomainError> {
        Ok(self.data.read().await.domains.clone())
    }

    async fn count_contacts(&self) -> Result<u64, DomainError> {
        Ok(self.data.read().await.contacts.len() as u64)
    }

    async fn count_open_deals(&self) -> Result<u64, DomainError> {
        Ok(count_open_deals(&self.data.read().await.deals))
    }

    async fn count_pending_payments(&self) -> Result<u64, DomainError> {
        Ok(count_pending_payments(&self.data.read().await.payments))
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DomainError> {
        let data = self.data.read().await;
        Ok(data
            .deals
            .iter()
            .find(|d| d.id == deal_id)
            .map(|d| data.deal_with_contact(d)))
    }

    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>, DomainError> {
        let data = self.data.read().await;
        Ok(data.domains.iter().find(|d| d.id == domain_id).cloned())
    }

    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
        self.commit(|data| {
            let id = next_id("pay", |id| data.payments.iter().any(|p| p.id == id));
            let row = Payment {
                id,
                deal_id: payment.deal_id.clone(),
                contact_id: payment.contact_id.clone(),
                amount: Some(payment.amount),
                payment_date: payment.payment_date.clone(),
                due_date: payment.due_date.clone(),
                status: payment.status,
                deal: None,
                contact: None,
            };
            data.payments.push(row.clone());
            Ok(row)
        })
        .await
    }

    async fn update_deal_payment(
        &self,
        deal_id: &str,
        update: &DealPaymentUpdate,
    ) -> Result<Deal, DomainError> {
        self.commit(|data| {
            let deal = data
                .deals
                .iter_mut()
                .find(|d| d.id == deal_id)
                .ok_or_else(|| DomainError::NotFound(format!("deals {}", deal_id)))?;
            deal.amount_paid = Some(update.amount_paid);
            deal.payment_status = update.payment_status;
            Ok(deal.clone())
        })
        .await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, DomainError> {
        self.commit(|data| {
            let task = data
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| DomainError::NotFound(format!("tasks {}", task_id)))?;
            task.status = status;
            Ok(task.clone())
        })
        .await
    }
}
