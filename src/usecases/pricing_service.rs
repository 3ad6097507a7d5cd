//! Pricing use case: look up domains and resolve their prices.

use crate::domain::{Domain, DomainError, PricingResult, resolve_price};
use crate::ports::DataGateway;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PricingService {
    gateway: Arc<dyn DataGateway>,
}

impl PricingService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    pub async fn domains(&self) -> Result<Vec<Domain>, DomainError> {
        self.gateway.list_domains().await
    }

    /// Price for one domain. `Ok(None)` means pricing is not configured;
    /// an unknown domain id is `NotFound`.
    pub async fn resolve_price(
        &self,
        domain_id: &str,
        base_amount: Option<f64>,
    ) -> Result<Option<PricingResult>, DomainError> {
        let domain = self
            .gateway
            .get_domain(domain_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("domain {}", domain_id)))?;
        Ok(resolve_price(&domain, base_amount))
    }

    /// Resolve each domain independently. Fetch failures, unknown ids and
    /// unconfigured pricing are logged and skipped; they never abort the batch.
    pub async fn resolve_prices(
        &self,
        domain_ids: &[String],
        base_amount: Option<f64>,
    ) -> Vec<PricingResult> {
        let mut results = Vec::with_capacity(domain_ids.len());
        for domain_id in domain_ids {
            match self.resolve_price(domain_id, base_amount).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => debug!(domain_id = %domain_id, "pricing not configured, skipped"),
                Err(e) => warn!(domain_id = %domain_id, error = %e, "could not price domain, skipped"),
            }
        }
        results
    }
}
