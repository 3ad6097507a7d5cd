//! PostgREST adapter for the hosted backend. Implements DataGateway over `reqwest`.
//!
//! Every request carries the project `apikey` and a bearer token (the user's
//! access token when configured). Relations are embedded server-side with
//! PostgREST's `select` syntax so the projection never issues N+1 requests.

use crate::domain::{
    Contact, Deal, DealPaymentUpdate, Domain, DomainError, Event, NewPayment, Payment, Task,
    TaskStatus,
};
use crate::ports::{DataGateway, Table};
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Payment rows with their deal (plus the deal's contact) and direct contact.
const PAYMENT_SELECT: &str = "*,deal:deals(*,contact:contacts(*)),contact:contacts(*)";
const DEAL_SELECT: &str = "*,contact:contacts(*)";
const PAYMENTS_ORDER: &str = "due_date.asc.nullslast";
const NOT_PAID: &str = "(status.is.null,status.neq.paid)";
const OPEN_STAGE: &str = "(workflow_stage.is.null,workflow_stage.not.in.(won,lost))";

/// REST gateway for a PostgREST / Supabase project.
pub struct RestGateway {
    client: Client,
    rest_url: String,
    api_key: String,
    bearer: String,
}

impl RestGateway {
    /// Create a gateway.
    ///
    /// # Arguments
    /// * `base_url` - Project URL (e.g. "https://xyz.supabase.co"); `/rest/v1` is appended
    /// * `api_key` - Project API key, sent as `apikey`
    /// * `bearer` - Token for `Authorization: Bearer` (user JWT or the API key)
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        api_key: String,
        bearer: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key,
            bearer,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.rest_url, table.name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, DomainError> {
        let response = self
            .authorized(self.client.get(self.table_url(table)).query(query))
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("{} request failed: {}", table, e)))?;
        let rows: Vec<T> = decode_rows(table, check_status(table, response).await?).await?;
        debug!(table = %table, rows = rows.len(), "fetched rows");
        Ok(rows)
    }

    /// Exact row count via `HEAD` + `Prefer: count=exact` (read from `Content-Range`).
    async fn count(&self, table: Table, query: &[(&str, &str)]) -> Result<u64, DomainError> {
        let response = self
            .authorized(self.client.head(self.table_url(table)).query(query))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("{} count failed: {}", table, e)))?;
        let response = check_status(table, response).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range(range).ok_or_else(|| {
            DomainError::Decode(format!("{}: unusable Content-Range '{}'", table, range))
        })
    }

    async fn first_by_id<T: DeserializeOwned>(
        &self,
        table: Table,
        id: &str,
        select: &str,
    ) -> Result<Option<T>, DomainError> {
        let filter = format!("eq.{}", id);
        let rows: Vec<T> = self
            .select(table, &[("select", select), ("id", filter.as_str())])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// `PATCH ?id=eq.{id}` returning the updated row.
    async fn patch<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: Table,
        id: &str,
        body: &B,
    ) -> Result<T, DomainError> {
        let filter = format!("eq.{}", id);
        let response = self
            .authorized(
                self.client
                    .patch(self.table_url(table))
                    .query(&[("id", filter.as_str())]),
            )
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("{} update failed: {}", table, e)))?;
        let rows: Vec<T> = decode(table, check_status(table, response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("{} {}", table, id)))
    }
}

/// 401/403 become `Auth`, any other non-success becomes `Gateway`.
async fn check_status(table: Table, response: Response) -> Result<Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    warn!(table = %table, status = %status, body = %text, "backend returned error");
    let detail = format!(
        "{} HTTP {}: {}",
        table,
        status,
        text.chars().take(200).collect::<String>()
    );
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DomainError::Auth(detail)),
        _ => Err(DomainError::Gateway(detail)),
    }
}

async fn decode<T: DeserializeOwned>(table: Table, response: Response) -> Result<T, DomainError> {
    let body = response
        .text()
        .await
        .map_err(|e| DomainError::Gateway(format!("{} body read failed: {}", table, e)))?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(table = %table, error = %e, body = %body.chars().take(200).collect::<String>(), "JSON decode failed");
        DomainError::Decode(format!("{}: {}", table, e))
    })
}

/// Decode a JSON array row by row. A body that is not an array is a `Decode`
/// error; a single row that does not fit `T` is logged and skipped.
async fn decode_rows<T: DeserializeOwned>(
    table: Table,
    response: Response,
) -> Result<Vec<T>, DomainError> {
    let raw: Vec<Value> = decode(table, response).await?;
    let total = raw.len();
    let rows: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let id = row.get("id").map(|v| v.to_string()).unwrap_or_default();
            serde_json::from_value(row)
                .map_err(|e| warn!(table = %table, index, id = %id, error = %e, "skipping malformed row"))
                .ok()
        })
        .collect();
    if rows.len() < total {
        warn!(table = %table, skipped = total - rows.len(), total, "some rows could not be decoded");
    }
    Ok(rows)
}

/// `"0-9/42"` or `"*/42"` -> 42.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait::async_trait]
impl DataGateway for RestGateway {
    async fn list_contacts(&self) -> Result<Vec<Contact>, DomainError> {
        self.select(Table::Contacts, &[("select", "*")]).await
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, DomainError> {
        self.select(Table::Deals, &[("select", DEAL_SELECT)]).await
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, DomainError> {
        self.select(
            Table::Payments,
            &[("select", PAYMENT_SELECT), ("order", PAYMENTS_ORDER)],
        )
        .await
    }

    async fn list_overdue_payments(&self, today: NaiveDate) -> Result<Vec<Payment>, DomainError> {
        let before = format!("lt.{}", today.format("%Y-%m-%d"));
        self.select(
            Table::Payments,
            &[
                ("select", PAYMENT_SELECT),
                ("due_date", before.as_str()),
                ("or", NOT_PAID),
                ("order", PAYMENTS_ORDER),
            ],
        )
        .await
    }

    async fn list_events(&self) -> Result<Vec<Event>, DomainError> {
        self.select(
            Table::Events,
            &[("select", "*"), ("order", "event_date.asc.nullslast")],
        )
        .await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, DomainError> {
        self.select(
            Table::Tasks,
            &[("select", "*"), ("order", "due_date.asc.nullslast")],
        )
        .await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, DomainError> {
        self.select(Table::Domains, &[("select", "*"), ("order", "name.asc")])
            .await
    }

    async fn count_contacts(&self) -> Result<u64, DomainError> {
        self.count(Table::Contacts, &[("select", "id")]).await
    }

    async fn count_open_deals(&self) -> Result<u64, DomainError> {
        self.count(Table::Deals, &[("select", "id"), ("or", OPEN_STAGE)])
            .await
    }

    async fn count_pending_payments(&self) -> Result<u64, DomainError> {
        self.count(Table::Payments, &[("select", "id"), ("or", NOT_PAID)])
            .await
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DomainError> {
        self.first_by_id(Table::Deals, deal_id, DEAL_SELECT).await
    }

    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>, DomainError> {
        self.first_by_id(Table::Domains, domain_id, "*").await
    }

    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
        let table = Table::Payments;
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(payment)
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("{} insert failed: {}", table, e)))?;
        let rows: Vec<Payment> = decode(table, check_status(table, response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DomainError::Decode("payments: insert returned no row".to_string()))
    }

    async fn update_deal_payment(
        &self,
        deal_id: &str,
        update: &DealPaymentUpdate,
    ) -> Result<Deal, DomainError> {
        self.patch(Table::Deals, deal_id, update).await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, DomainError> {
        self.patch(
            Table::Tasks,
            task_id,
            &serde_json::json!({ "status": status }),
        )
        .await
    }
}
