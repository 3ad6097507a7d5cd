//! Write-side use cases: record a payment against a deal, move a task.
//!
//! Writes go through the gateway; when it is the `CachedGateway` the related
//! caches are invalidated and subscribers are notified there.

use crate::domain::{
    Deal, DealPaymentUpdate, DomainError, NewPayment, Payment, PaymentStatus, Task, TaskStatus,
};
use crate::ports::DataGateway;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The stored payment and the deal as updated by it.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub deal: Deal,
}

pub struct PaymentService {
    gateway: Arc<dyn DataGateway>,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Record `amount` paid on `deal_id` on `paid_on`.
    ///
    /// Inserts a paid payment row, then raises the deal's `amount_paid` and
    /// re-derives its `payment_status`. Overpayment is logged, not rejected.
    pub async fn record_payment(
        &self,
        deal_id: &str,
        amount: f64,
        paid_on: NaiveDate,
    ) -> Result<PaymentReceipt, DomainError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::InvalidInput(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let deal = self
            .gateway
            .get_deal(deal_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("deal {}", deal_id)))?;

        let amount_total = deal.amount_total_or_zero();
        let amount_paid = deal.amount_paid_or_zero() + amount;
        if amount_total > 0.0 && amount_paid > amount_total {
            warn!(
                deal_id,
                amount_paid, amount_total, "payment exceeds deal total"
            );
        }

        let date = paid_on.format("%Y-%m-%d").to_string();
        let payment = self
            .gateway
            .insert_payment(&NewPayment {
                deal_id: Some(deal.id.clone()),
                contact_id: deal.contact_id.clone(),
                amount,
                payment_date: Some(date.clone()),
                due_date: Some(date),
                status: PaymentStatus::Paid,
            })
            .await?;

        // The payment row is stored at this point; a failed deal update must
        // say so instead of looking like nothing happened.
        let deal = self
            .gateway
            .update_deal_payment(
                &deal.id,
                &DealPaymentUpdate {
                    amount_paid,
                    payment_status: PaymentStatus::from_amounts(amount_paid, amount_total),
                },
            )
            .await
            .map_err(|e| {
                error!(
                    deal_id = %deal.id,
                    payment_id = %payment.id,
                    error = %e,
                    "payment stored but deal not updated"
                );
                DomainError::PartialWrite(format!(
                    "payment {} stored but deal {} not updated ({}); set amount_paid to {}",
                    payment.id, deal.id, e, amount_paid
                ))
            })?;

        info!(
            deal_id = %deal.id,
            payment_id = %payment.id,
            amount,
            status = deal.payment_status.as_str(),
            "payment recorded"
        );
        Ok(PaymentReceipt { payment, deal })
    }

    pub async fn set_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, DomainError> {
        let task = self.gateway.update_task_status(task_id, status).await?;
        info!(task_id, status = status.as_str(), "task status updated");
        Ok(task)
    }

    /// Tasks that are not done, earliest due first (undated last).
    pub async fn open_tasks(&self) -> Result<Vec<Task>, DomainError> {
        let mut tasks: Vec<Task> = self
            .gateway
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Done)
            .collect();
        tasks.sort_by_key(|t| {
            let due = t.due_on();
            (due.is_none(), due)
        });
        Ok(tasks)
    }

    pub async fn deals(&self) -> Result<Vec<Deal>, DomainError> {
        self.gateway.list_deals().await
    }
}
