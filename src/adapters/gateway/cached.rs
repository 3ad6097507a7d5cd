//! Cache layer over any DataGateway, plus change subscription.
//!
//! List and count results are kept per table for a TTL. A successful write
//! drops the written table and its related tables (`Table::related`) and then
//! broadcasts a `ChangeEvent` to subscribers, who decide what to refresh.
//! Point lookups and the overdue listing always go to the inner gateway.

use crate::domain::{
    Contact, Deal, DealPaymentUpdate, Domain, DomainError, Event, NewPayment, Payment, Task,
    TaskStatus,
};
use crate::ports::{DataGateway, Table};
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Emitted after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub record_id: String,
}

/// One cached value with the instant it was fetched.
///
/// `generation` is bumped on every `clear`; a fetch only stores its result if
/// no clear happened while it was in flight, so rows read before a write can
/// never repopulate the slot after it.
struct Slot<T> {
    inner: RwLock<Entry<T>>,
}

struct Entry<T> {
    generation: u64,
    value: Option<(Instant, T)>,
}

impl<T: Clone> Slot<T> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Entry {
                generation: 0,
                value: None,
            }),
        }
    }

    async fn get_or_fetch<F, Fut>(&self, ttl: Duration, fetch: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let generation = {
            let entry = self.inner.read().await;
            if let Some((fetched_at, value)) = &entry.value {
                if fetched_at.elapsed() < ttl {
                    return Ok(value.clone());
                }
            }
            entry.generation
        };
        // Failures are not cached: the next call retries.
        let fresh = fetch().await?;
        let mut entry = self.inner.write().await;
        if entry.generation == generation {
            entry.value = Some((Instant::now(), fresh.clone()));
        } else {
            debug!("slot cleared during fetch, result not cached");
        }
        Ok(fresh)
    }

    async fn clear(&self) {
        let mut entry = self.inner.write().await;
        entry.generation = entry.generation.wrapping_add(1);
        entry.value = None;
    }
}

/// Caching decorator. Share via `Arc`; all methods take `&self`.
pub struct CachedGateway {
    inner: Arc<dyn DataGateway>,
    ttl: Duration,
    changes: broadcast::Sender<ChangeEvent>,
    contacts: Slot<Vec<Contact>>,
    deals: Slot<Vec<Deal>>,
    payments: Slot<Vec<Payment>>,
    events: Slot<Vec<Event>>,
    tasks: Slot<Vec<Task>>,
    domains: Slot<Vec<Domain>>,
    contact_count: Slot<u64>,
    open_deal_count: Slot<u64>,
    pending_payment_count: Slot<u64>,
}

impl CachedGateway {
    pub fn new(inner: Arc<dyn DataGateway>, ttl: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner,
            ttl,
            changes,
            contacts: Slot::new(),
            deals: Slot::new(),
            payments: Slot::new(),
            events: Slot::new(),
            tasks: Slot::new(),
            domains: Slot::new(),
            contact_count: Slot::new(),
            open_deal_count: Slot::new(),
            pending_payment_count: Slot::new(),
        }
    }

    /// Receive a `ChangeEvent` after every successful write through this gateway.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Drop cached results for `table` and every table related to it.
    pub async fn invalidate(&self, table: Table) {
        for &t in table.related() {
            self.clear(t).await;
        }
        debug!(table = %table, "cache invalidated");
    }

    /// Drop everything (manual refresh).
    pub async fn invalidate_all(&self) {
        for t in Table::ALL {
            self.clear(t).await;
        }
    }

    async fn clear(&self, table: Table) {
        match table {
            Table::Contacts => {
                self.contacts.clear().await;
                self.contact_count.clear().await;
            }
            Table::Deals => {
                self.deals.clear().await;
                self.open_deal_count.clear().await;
            }
            Table::Payments => {
                self.payments.clear().await;
                self.pending_payment_count.clear().await;
            }
            Table::Events => self.events.clear().await,
            Table::Tasks => self.tasks.clear().await,
            Table::Domains => self.domains.clear().await,
        }
    }

    async fn written(&self, table: Table, record_id: &str) {
        self.invalidate(table).await;
        let event = ChangeEvent {
            table,
            record_id: record_id.to_string(),
        };
        if self.changes.send(event).is_err() {
            debug!(table = %table, "no change subscribers");
        }
    }
}

#[async_trait::async_trait]
impl DataGateway for CachedGateway {
    async fn list_contacts(&self) -> Result<Vec<Contact>, DomainError> {
        self.contacts
            .get_or_fetch(self.ttl, || self.inner.list_contacts())
            .await
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, DomainError> {
        self.deals
            .get_or_fetch(self.ttl, || self.inner.list_deals())
            .await
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, DomainError> {
        self.payments
            .get_or_fetch(self.ttl, || self.inner.list_payments())
            .await
    }

    async fn list_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Payment>, DomainError> {
        self.inner.list_overdue_payments(today).await
    }

    async fn list_events(&self) -> Result<Vec<Event>, DomainError> {
        self.events
            .get_or_fetch(self.ttl, || self.inner.list_events())
            .await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, DomainError> {
        self.tasks
            .get_or_fetch(self.ttl, || self.inner.list_tasks())
            .await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, DomainError> {
        self.domains
            .get_or_fetch(self.ttl, || self.inner.list_domains())
            .await
    }

    async fn count_contacts(&self) -> Result<u64, DomainError> {
        self.contact_count
            .get_or_fetch(self.ttl, || self.inner.count_contacts())
            .await
    }

    async fn count_open_deals(&self) -> Result<u64, DomainError> {
        self.open_deal_count
            .get_or_fetch(self.ttl, || self.inner.count_open_deals())
            .await
    }

    async fn count_pending_payments(&self) -> Result<u64, DomainError> {
        self.pending_payment_count
            .get_or_fetch(self.ttl, || self.inner.count_pending_payments())
            .await
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DomainError> {
        self.inner.get_deal(deal_id).await
    }

    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>, DomainError> {
        self.inner.get_domain(domain_id).await
    }

    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
        let stored = self.inner.insert_payment(payment).await?;
        self.written(Table::Payments, &stored.id).await;
        Ok(stored)
    }

    async fn update_deal_payment(
        &self,
        deal_id: &str,
        update: &DealPaymentUpdate,
    ) -> Result<Deal, DomainError> {
        let deal = self.inner.update_deal_payment(deal_id, update).await?;
        self.written(Table::Deals, &deal.id).await;
        Ok(deal)
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, DomainError> {
        let task = self.inner.update_task_status(task_id, status).await?;
        self.written(Table::Tasks, &task.id).await;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::snapshot::{Snapshot, SnapshotGateway};
    use crate::domain::PaymentStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts payment list calls and can be switched to fail.
    struct CountingGateway {
        inner: SnapshotGateway,
        payment_fetches: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        /// Hold read payment rows for a while before returning them.
        slow: std::sync::atomic::AtomicBool,
    }

    impl CountingGateway {
        fn new() -> Self {
            Self {
                inner: SnapshotGateway::in_memory(Snapshot {
                    tasks: vec![Task {
                        id: "t1".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                payment_fetches: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
                slow: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn fetches(&self) -> usize {
            self.payment_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl DataGateway for CountingGateway {
        async fn list_contacts(&self) -> Result<Vec<Contact>, DomainError> {
            self.inner.list_contacts().await
        }
        async fn list_deals(&self) -> Result<Vec<Deal>, DomainError> {
            self.inner.list_deals().await
        }
        async fn list_payments(&self) -> Result<Vec<Payment>, DomainError> {
            self.payment_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DomainError::Gateway("offline".into()));
            }
            let rows = self.inner.list_payments().await;
            if self.slow.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            rows
        }
        async fn list_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Payment>, DomainError> {
            self.inner.list_overdue_payments(today).await
        }
        async fn list_events(&self) -> Result<Vec<Event>, DomainError> {
            self.inner.list_events().await
        }
        async fn list_tasks(&self) -> Result<Vec<Task>, DomainError> {
            self.inner.list_tasks().await
        }
        async fn list_domains(&self) -> Result<Vec<Domain>, DomainError> {
            self.inner.list_domains().await
        }
        async fn count_contacts(&self) -> Result<u64, DomainError> {
            self.inner.count_contacts().await
        }
        async fn count_open_deals(&self) -> Result<u64, DomainError> {
            self.inner.count_open_deals().await
        }
        async fn count_pending_payments(&self) -> Result<u64, DomainError> {
            self.inner.count_pending_payments().await
        }
        async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DomainError> {
            self.inner.get_deal(deal_id).await
        }
        async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>, DomainError> {
            self.inner.get_domain(domain_id).await
        }
        async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
            self.inner.insert_payment(payment).await
        }
        async fn update_deal_payment(
            &self,
            deal_id: &str,
            update: &DealPaymentUpdate,
        ) -> Result<Deal, DomainError> {
            self.inner.update_deal_payment(deal_id, update).await
        }
        async fn update_task_status(
            &self,
            task_id: &str,
            status: TaskStatus,
        ) -> Result<Task, DomainError> {
            self.inner.update_task_status(task_id, status).await
        }
    }

    fn new_payment() -> NewPayment {
        NewPayment {
            deal_id: None,
            contact_id: None,
            amount: 50.0,
            payment_date: Some("2024-03-02".into()),
            due_date: None,
            status: PaymentStatus::Paid,
        }
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_served_from_cache() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::from_secs(60));
        cached.list_payments().await.unwrap();
        cached.list_payments().await.unwrap();
        assert_eq!(counting.fetches(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::ZERO);
        cached.list_payments().await.unwrap();
        cached.list_payments().await.unwrap();
        assert_eq!(counting.fetches(), 2);
    }

    #[tokio::test]
    async fn write_invalidates_and_notifies() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::from_secs(60));
        let mut changes = cached.subscribe();

        assert!(cached.list_payments().await.unwrap().is_empty());
        let stored = cached.insert_payment(&new_payment()).await.unwrap();

        let event = changes.recv().await.unwrap();
        assert_eq!(event.table, Table::Payments);
        assert_eq!(event.record_id, stored.id);

        let payments = cached.list_payments().await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(counting.fetches(), 2);
    }

    #[tokio::test]
    async fn unrelated_write_keeps_payment_cache() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::from_secs(60));
        cached.list_payments().await.unwrap();
        cached
            .update_task_status("t1", TaskStatus::Done)
            .await
            .unwrap();
        cached.list_payments().await.unwrap();
        assert_eq!(counting.fetches(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::from_secs(60));
        counting.fail.store(true, Ordering::SeqCst);
        assert!(cached.list_payments().await.is_err());
        counting.fail.store(false, Ordering::SeqCst);
        assert!(cached.list_payments().await.is_ok());
        assert_eq!(counting.fetches(), 2);
    }

    #[tokio::test]
    async fn fetch_in_flight_during_write_does_not_repopulate_cache() {
        let counting = Arc::new(CountingGateway::new());
        counting.slow.store(true, Ordering::SeqCst);
        let cached = Arc::new(CachedGateway::new(counting.clone(), Duration::from_secs(60)));

        let reader = {
            let cached = cached.clone();
            tokio::spawn(async move { cached.list_payments().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cached.insert_payment(&new_payment()).await.unwrap();

        // The in-flight read saw the table before the insert.
        assert!(reader.await.unwrap().unwrap().is_empty());

        counting.slow.store(false, Ordering::SeqCst);
        assert_eq!(cached.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_does_not_notify() {
        let counting = Arc::new(CountingGateway::new());
        let cached = CachedGateway::new(counting.clone(), Duration::from_secs(60));
        let mut changes = cached.subscribe();
        assert!(cached
            .update_task_status("missing", TaskStatus::Done)
            .await
            .is_err());
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
