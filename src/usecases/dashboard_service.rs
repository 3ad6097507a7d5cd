//! Dashboard use case: fetch the row sets concurrently, then aggregate.
//!
//! Fetch failures propagate as `Err`; they are never reported as zero stats.

use crate::domain::{
    DashboardInput, DashboardStats, DomainError, OverduePayment, compute_dashboard_stats,
    compute_overdue_payments,
};
use crate::ports::DataGateway;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

pub struct DashboardService {
    gateway: Arc<dyn DataGateway>,
}

impl DashboardService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Dashboard statistics as of `now`.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, DomainError> {
        let (payments, contact_count, open_deal_count, pending_payment_count, deals, tasks, events) = tokio::try_join!(
            self.gateway.list_payments(),
            self.gateway.count_contacts(),
            self.gateway.count_open_deals(),
            self.gateway.count_pending_payments(),
            self.gateway.list_deals(),
            self.gateway.list_tasks(),
            self.gateway.list_events(),
        )?;

        let stats = compute_dashboard_stats(
            &DashboardInput {
                payments: &payments,
                contact_count,
                open_deal_count,
                pending_payment_count,
                deals: &deals,
                tasks: &tasks,
                events: &events,
            },
            now,
        );

        info!(
            payments = payments.len(),
            deals = deals.len(),
            total_revenue = stats.total_revenue,
            monthly_revenue = stats.monthly_revenue,
            "dashboard computed"
        );
        Ok(stats)
    }

    /// Overdue payments as of `today`, oldest debt first.
    pub async fn overdue_payments(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<OverduePayment>, DomainError> {
        let payments = self.gateway.list_overdue_payments(today).await?;
        let overdue = compute_overdue_payments(&payments, today);
        info!(count = overdue.len(), "overdue payments computed");
        Ok(overdue)
    }
}
