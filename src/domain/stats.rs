//! Dashboard aggregation and the overdue payments projection.
//!
//! Pure functions over already-fetched rows. Fetching, caching and
//! refreshing belong to the use cases and adapters.

use crate::domain::entities::{Deal, Event, Payment, PaymentStatus, Task, TaskStatus};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

/// Label used for deals without a workflow stage.
pub const NO_STAGE_LABEL: &str = "no stage";

/// Client name shown when neither the payment nor its deal resolves a contact.
pub const UNKNOWN_CLIENT: &str = "Unknown client";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub active_clients: u64,
    pub open_deals: u64,
    pub pending_payments: u64,
    pub monthly_revenue: f64,
    pub completed_tasks: u64,
    pub total_tasks: u64,
    pub upcoming_events: u64,
    /// One entry per distinct stage, in order of first occurrence.
    pub deals_by_stage: Vec<StageCount>,
}

/// Row sets and precomputed counts the dashboard is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardInput<'a> {
    pub payments: &'a [Payment],
    pub contact_count: u64,
    pub open_deal_count: u64,
    pub pending_payment_count: u64,
    pub deals: &'a [Deal],
    pub tasks: &'a [Task],
    pub events: &'a [Event],
}

pub fn compute_dashboard_stats(input: &DashboardInput<'_>, now: DateTime<Utc>) -> DashboardStats {
    let month_prefix = now.format("%Y-%m").to_string();

    let total_revenue = input.payments.iter().map(Payment::amount_or_zero).sum();
    let monthly_revenue = input
        .payments
        .iter()
        .filter(|p| {
            p.payment_date
                .as_deref()
                .is_some_and(|d| d.trim().starts_with(&month_prefix))
        })
        .map(Payment::amount_or_zero)
        .sum();

    let completed_tasks = input
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count() as u64;

    let upcoming_events = match start_of_next_month(now) {
        Some(month_end) => input
            .events
            .iter()
            .filter_map(Event::starts_at)
            .filter(|at| *at >= now && *at < month_end)
            .count() as u64,
        None => 0,
    };

    DashboardStats {
        total_revenue,
        active_clients: input.contact_count,
        open_deals: input.open_deal_count,
        pending_payments: input.pending_payment_count,
        monthly_revenue,
        completed_tasks,
        total_tasks: input.tasks.len() as u64,
        upcoming_events,
        deals_by_stage: group_deals_by_stage(input.deals),
    }
}

/// Deals whose stage is absent or not "won"/"lost".
pub fn count_open_deals(deals: &[Deal]) -> u64 {
    deals.iter().filter(|d| d.is_open()).count() as u64
}

/// Payments not yet settled.
pub fn count_pending_payments(payments: &[Payment]) -> u64 {
    payments
        .iter()
        .filter(|p| p.status != PaymentStatus::Paid)
        .count() as u64
}

pub fn group_deals_by_stage(deals: &[Deal]) -> Vec<StageCount> {
    let mut groups: Vec<StageCount> = Vec::new();
    for deal in deals {
        let stage = deal.workflow_stage.as_deref().unwrap_or(NO_STAGE_LABEL);
        match groups.iter_mut().find(|g| g.stage == stage) {
            Some(group) => group.count += 1,
            None => groups.push(StageCount {
                stage: stage.to_string(),
                count: 1,
            }),
        }
    }
    groups
}

/// First instant after the calendar month of `now`.
fn start_of_next_month(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueIndicator {
    Paid,
    Partial,
    Unpaid,
}

impl OverdueIndicator {
    pub fn label(self) -> &'static str {
        match self {
            OverdueIndicator::Paid => "paid",
            OverdueIndicator::Partial => "partial",
            OverdueIndicator::Unpaid => "unpaid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverduePayment {
    pub id: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub deal_title: Option<String>,
    pub category: Option<String>,
    pub amount_total: f64,
    pub amount_paid: f64,
    pub amount_pending: f64,
    pub days_overdue: u64,
    pub due_date: NaiveDate,
    pub payment_status: OverdueIndicator,
}

/// Overdue payments joined with their deal and contact, in input order.
///
/// Gateways hand payments over sorted by due date, so the result lists the
/// oldest debt first.
pub fn compute_overdue_payments(payments: &[Payment], today: NaiveDate) -> Vec<OverduePayment> {
    payments
        .iter()
        .filter(|p| p.is_overdue(today))
        .filter_map(|p| project_overdue(p, today))
        .collect()
}

fn project_overdue(payment: &Payment, today: NaiveDate) -> Option<OverduePayment> {
    let due_date = payment.due_on()?;
    let contact = payment.resolved_contact();
    let deal = payment.deal.as_ref();

    let (amount_total, amount_paid) = match deal {
        Some(d) => (d.amount_total_or_zero(), d.amount_paid_or_zero()),
        None => (payment.amount_or_zero(), 0.0),
    };

    Some(OverduePayment {
        id: payment.id.clone(),
        client_name: contact
            .and_then(|c| c.display_name())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
        client_phone: contact.and_then(|c| c.phone.clone()),
        deal_title: deal.and_then(|d| d.title.clone()),
        category: deal.and_then(|d| d.category.clone()),
        amount_total,
        amount_paid,
        amount_pending: (amount_total - amount_paid).max(0.0),
        days_overdue: days_overdue(due_date, today),
        due_date,
        payment_status: overdue_indicator(payment),
    })
}

/// Whole days between `due_date` and `today`; never negative.
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> u64 {
    (today - due_date).num_days().max(0) as u64
}

fn overdue_indicator(payment: &Payment) -> OverdueIndicator {
    if payment.status == PaymentStatus::Paid {
        return OverdueIndicator::Paid;
    }
    let paid_on_deal = payment
        .deal
        .as_ref()
        .map(Deal::amount_paid_or_zero)
        .unwrap_or(0.0);
    if paid_on_deal > 0.0 {
        OverdueIndicator::Partial
    } else {
        OverdueIndicator::Unpaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Contact, EventStatus};
    use quickcheck_macros::quickcheck;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap().and_utc()
    }

    fn payment(id: &str, amount: Option<f64>, payment_date: Option<&str>) -> Payment {
        Payment {
            id: id.to_string(),
            amount,
            payment_date: payment_date.map(str::to_string),
            ..Default::default()
        }
    }

    fn deal(stage: Option<&str>) -> Deal {
        Deal {
            id: "d".to_string(),
            workflow_stage: stage.map(str::to_string),
            ..Default::default()
        }
    }

    fn event(when: &str) -> Event {
        Event {
            id: "e".to_string(),
            event_date: Some(when.to_string()),
            status: EventStatus::Scheduled,
            ..Default::default()
        }
    }

    #[test]
    fn monthly_and_total_revenue() {
        let payments = vec![
            payment("a", Some(1000.0), Some("2024-03-15")),
            payment("b", Some(500.0), Some("2024-02-10")),
        ];
        let input = DashboardInput {
            payments: &payments,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 3, 20, 9));
        assert_eq!(stats.monthly_revenue, 1000.0);
        assert_eq!(stats.total_revenue, 1500.0);
    }

    #[test]
    fn null_amounts_and_missing_dates_contribute_zero() {
        let payments = vec![
            payment("a", None, Some("2024-03-01")),
            payment("b", Some(250.0), None),
            payment("c", Some(100.0), Some("2024-03-31")),
        ];
        let input = DashboardInput {
            payments: &payments,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 3, 20, 9));
        assert_eq!(stats.total_revenue, 350.0);
        assert_eq!(stats.monthly_revenue, 100.0);
    }

    #[test]
    fn pass_through_counts() {
        let input = DashboardInput {
            contact_count: 12,
            open_deal_count: 4,
            pending_payment_count: 3,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 3, 20, 9));
        assert_eq!(stats.active_clients, 12);
        assert_eq!(stats.open_deals, 4);
        assert_eq!(stats.pending_payments, 3);
    }

    #[test]
    fn deals_grouped_by_stage_in_first_occurrence_order() {
        let deals = vec![
            deal(Some("won")),
            deal(Some("won")),
            deal(Some("lost")),
            deal(None),
        ];
        let groups = group_deals_by_stage(&deals);
        assert_eq!(
            groups,
            vec![
                StageCount { stage: "won".into(), count: 2 },
                StageCount { stage: "lost".into(), count: 1 },
                StageCount { stage: NO_STAGE_LABEL.into(), count: 1 },
            ]
        );
        assert_eq!(count_open_deals(&deals), 1);
    }

    #[test]
    fn task_counts() {
        let tasks = vec![
            Task { id: "1".into(), status: TaskStatus::Done, ..Default::default() },
            Task { id: "2".into(), status: TaskStatus::InProgress, ..Default::default() },
            Task { id: "3".into(), status: TaskStatus::Done, ..Default::default() },
            Task { id: "4".into(), status: TaskStatus::Unknown, ..Default::default() },
        ];
        let input = DashboardInput {
            tasks: &tasks,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 3, 20, 9));
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.total_tasks, 4);
    }

    #[test]
    fn upcoming_events_are_bounded_by_now_and_month_end() {
        let events = vec![
            event("2024-03-20T09:00:00+00:00"), // exactly now: included
            event("2024-03-20T08:59:00+00:00"), // past
            event("2024-03-31T23:30:00Z"),      // last evening of the month
            event("2024-04-01T00:00:00Z"),      // next month
            event("not a date"),
            Event { id: "x".into(), ..Default::default() },
        ];
        let input = DashboardInput {
            events: &events,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 3, 20, 9));
        assert_eq!(stats.upcoming_events, 2);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let events = vec![event("2024-12-31T22:00:00Z"), event("2025-01-01T08:00:00Z")];
        let input = DashboardInput {
            events: &events,
            ..Default::default()
        };
        let stats = compute_dashboard_stats(&input, at(2024, 12, 15, 12));
        assert_eq!(stats.upcoming_events, 1);
    }

    #[test]
    fn pending_payment_count_excludes_paid() {
        let mut paid = payment("a", Some(1.0), None);
        paid.status = PaymentStatus::Paid;
        let mut partial = payment("b", Some(1.0), None);
        partial.status = PaymentStatus::Partial;
        let pending = payment("c", Some(1.0), None);
        assert_eq!(count_pending_payments(&[paid, partial, pending]), 2);
    }

    #[quickcheck]
    fn dashboard_is_a_pure_function(rows: Vec<(Option<u16>, u8, bool)>) -> bool {
        let stages = [Some("won"), Some("lost"), None, Some("proposal")];
        let payments: Vec<Payment> = rows
            .iter()
            .map(|(amount, day, dated)| Payment {
                id: day.to_string(),
                amount: amount.map(f64::from),
                payment_date: dated.then(|| format!("2024-03-{:02}", day % 28 + 1)),
                ..Default::default()
            })
            .collect();
        let deals: Vec<Deal> = rows
            .iter()
            .map(|(_, day, _)| deal(stages[*day as usize % stages.len()]))
            .collect();
        let input = DashboardInput {
            payments: &payments,
            contact_count: rows.len() as u64,
            open_deal_count: count_open_deals(&deals),
            pending_payment_count: count_pending_payments(&payments),
            deals: &deals,
            ..Default::default()
        };
        let now = at(2024, 3, 20, 9);
        compute_dashboard_stats(&input, now) == compute_dashboard_stats(&input, now)
    }

    fn overdue_payment(due: &str, status: PaymentStatus) -> Payment {
        Payment {
            id: format!("p-{}", due),
            amount: Some(300.0),
            due_date: Some(due.to_string()),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn overdue_boundary_is_strict() {
        let today = date(2024, 3, 20);
        let payments = vec![
            overdue_payment("2024-03-20", PaymentStatus::Pending),
            overdue_payment("2024-03-19", PaymentStatus::Pending),
            overdue_payment("2024-01-01", PaymentStatus::Paid),
        ];
        let overdue = compute_overdue_payments(&payments, today);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].due_date, date(2024, 3, 19));
        assert_eq!(overdue[0].days_overdue, 1);
    }

    #[test]
    fn days_overdue_never_negative() {
        let today = date(2024, 3, 20);
        assert_eq!(days_overdue(date(2024, 3, 15), today), 5);
        assert_eq!(days_overdue(today, today), 0);
        assert_eq!(days_overdue(date(2024, 3, 25), today), 0);
    }

    #[test]
    fn overdue_rows_are_joined_with_deal_and_contact() {
        let today = date(2024, 3, 20);
        let p = Payment {
            id: "p1".into(),
            amount: Some(500.0),
            due_date: Some("2024-03-15".into()),
            status: PaymentStatus::Partial,
            deal: Some(Deal {
                id: "d1".into(),
                title: Some("Spring camp".into()),
                category: Some("sports".into()),
                amount_total: Some(2000.0),
                amount_paid: Some(500.0),
                contact: Some(Contact {
                    id: "c1".into(),
                    first_name: Some("Maria".into()),
                    last_name: Some("Lopez".into()),
                    phone: Some("+34 600 000 000".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let rows = compute_overdue_payments(&[p], today);
        let row = &rows[0];
        assert_eq!(row.client_name, "Maria Lopez");
        assert_eq!(row.client_phone.as_deref(), Some("+34 600 000 000"));
        assert_eq!(row.deal_title.as_deref(), Some("Spring camp"));
        assert_eq!(row.category.as_deref(), Some("sports"));
        assert_eq!(row.amount_total, 2000.0);
        assert_eq!(row.amount_paid, 500.0);
        assert_eq!(row.amount_pending, 1500.0);
        assert_eq!(row.days_overdue, 5);
        assert_eq!(row.payment_status, OverdueIndicator::Partial);
    }

    #[test]
    fn overdue_without_contact_or_deal() {
        let today = date(2024, 3, 20);
        let rows =
            compute_overdue_payments(&[overdue_payment("2024-03-01", PaymentStatus::Pending)], today);
        let row = &rows[0];
        assert_eq!(row.client_name, UNKNOWN_CLIENT);
        assert_eq!(row.amount_total, 300.0);
        assert_eq!(row.amount_paid, 0.0);
        assert_eq!(row.amount_pending, 300.0);
        assert_eq!(row.payment_status, OverdueIndicator::Unpaid);
    }

    #[test]
    fn paid_indicator_is_handled() {
        let p = overdue_payment("2024-03-01", PaymentStatus::Paid);
        assert_eq!(overdue_indicator(&p), OverdueIndicator::Paid);
    }

    #[test]
    fn overdue_preserves_input_order_and_handles_empty() {
        let today = date(2024, 3, 20);
        assert!(compute_overdue_payments(&[], today).is_empty());

        let payments = vec![
            overdue_payment("2024-01-05", PaymentStatus::Pending),
            overdue_payment("2024-02-05", PaymentStatus::Pending),
            overdue_payment("garbage", PaymentStatus::Pending),
        ];
        let rows = compute_overdue_payments(&payments, today);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].due_date, date(2024, 1, 5));
        assert_eq!(rows[1].due_date, date(2024, 2, 5));
    }
}
