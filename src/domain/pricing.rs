//! Domain pricing resolver. Turns a domain's pricing policy plus an optional
//! base amount into a price and a human-readable explanation.
//!
//! "Not configured" is `None`; "percentage without a base" is a zero-price
//! result with `PricingStatus::MissingBaseAmount`.

use crate::domain::entities::{Domain, PricingType};
use serde::Serialize;

/// Phrase carried by explanations of percentage results that had no base amount.
pub const MISSING_BASE_NOTE: &str = "no base amount provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStatus {
    Priced,
    /// Percentage policy but no base amount: price is 0.
    MissingBaseAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub domain_id: String,
    pub domain_name: Option<String>,
    pub price: f64,
    pub explanation: String,
    pub status: PricingStatus,
}

impl PricingResult {
    pub fn is_missing_base(&self) -> bool {
        self.status == PricingStatus::MissingBaseAmount
    }
}

/// Resolve one domain. `None` when the policy is incomplete or unrecognized.
pub fn resolve_price(domain: &Domain, base_amount: Option<f64>) -> Option<PricingResult> {
    let pricing_type = domain.pricing_type?;
    let value = domain.pricing_value?;

    let (price, explanation, status) = match pricing_type {
        PricingType::Full => (
            value,
            format!("Full package price: {}", format_amount(value)),
            PricingStatus::Priced,
        ),
        // Same arithmetic as `Full`; the business names them differently.
        PricingType::Fixed => (
            value,
            format!("Fixed fee: {}", format_amount(value)),
            PricingStatus::Priced,
        ),
        PricingType::Percentage => match base_amount.filter(|b| b.is_finite()) {
            Some(base) => {
                let price = base * value / 100.0;
                (
                    price,
                    format!(
                        "{}% of {} = {}",
                        value,
                        format_amount(base),
                        format_amount(price)
                    ),
                    PricingStatus::Priced,
                )
            }
            None => (
                0.0,
                format!("{}% of base amount: {}", value, MISSING_BASE_NOTE),
                PricingStatus::MissingBaseAmount,
            ),
        },
        PricingType::Unknown => return None,
    };

    let explanation = match domain.pricing_notes.as_deref().map(str::trim) {
        Some(notes) if !notes.is_empty() => format!("{} ({})", explanation, notes),
        _ => explanation,
    };

    Some(PricingResult {
        domain_id: domain.id.clone(),
        domain_name: domain.name.clone(),
        price,
        explanation,
        status,
    })
}

/// Resolve each domain independently, skipping the ones without usable pricing.
pub fn resolve_prices(domains: &[Domain], base_amount: Option<f64>) -> Vec<PricingResult> {
    domains
        .iter()
        .filter_map(|d| resolve_price(d, base_amount))
        .collect()
}

pub fn total_price(results: &[PricingResult]) -> f64 {
    results.iter().map(|r| r.price).sum()
}

/// `3000` -> `"3,000"`, `1234.5` -> `"1,234.50"`. Rounded to cents.
pub fn format_amount(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    if frac == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{:02}", sign, grouped, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(pricing_type: Option<PricingType>, value: Option<f64>) -> Domain {
        Domain {
            id: "dom-1".to_string(),
            name: Some("Coaching".to_string()),
            pricing_type,
            pricing_value: value,
            pricing_notes: None,
        }
    }

    #[test]
    fn full_price_is_flat_value() {
        let r = resolve_price(&domain(Some(PricingType::Full), Some(3000.0)), None).unwrap();
        assert_eq!(r.price, 3000.0);
        assert!(r.explanation.contains("3,000"));
        assert_eq!(r.status, PricingStatus::Priced);
    }

    #[test]
    fn fixed_matches_full_numerically_but_keeps_its_own_wording() {
        let full = resolve_price(&domain(Some(PricingType::Full), Some(450.0)), Some(9999.0)).unwrap();
        let fixed =
            resolve_price(&domain(Some(PricingType::Fixed), Some(450.0)), Some(9999.0)).unwrap();
        assert_eq!(full.price, fixed.price);
        assert_ne!(full.explanation, fixed.explanation);
        assert!(fixed.explanation.starts_with("Fixed fee"));
    }

    #[test]
    fn percentage_with_base() {
        let r =
            resolve_price(&domain(Some(PricingType::Percentage), Some(10.0)), Some(2000.0)).unwrap();
        assert_eq!(r.price, 200.0);
        assert_eq!(r.explanation, "10% of 2,000 = 200");
        assert!(!r.is_missing_base());
    }

    #[test]
    fn percentage_without_base_is_degraded_not_none() {
        let r = resolve_price(&domain(Some(PricingType::Percentage), Some(10.0)), None).unwrap();
        assert_eq!(r.price, 0.0);
        assert!(r.explanation.contains(MISSING_BASE_NOTE));
        assert!(r.is_missing_base());
    }

    #[test]
    fn missing_configuration_yields_none() {
        assert!(resolve_price(&domain(None, None), None).is_none());
        assert!(resolve_price(&domain(Some(PricingType::Full), None), None).is_none());
        assert!(resolve_price(&domain(None, Some(100.0)), None).is_none());
    }

    #[test]
    fn unknown_policy_yields_none() {
        assert!(resolve_price(&domain(Some(PricingType::Unknown), Some(5.0)), Some(10.0)).is_none());
    }

    #[test]
    fn notes_are_appended_in_parentheses() {
        let mut d = domain(Some(PricingType::Full), Some(1200.0));
        d.pricing_notes = Some("includes kit".to_string());
        let r = resolve_price(&d, None).unwrap();
        assert_eq!(r.explanation, "Full package price: 1,200 (includes kit)");

        d.pricing_notes = Some("   ".to_string());
        let r = resolve_price(&d, None).unwrap();
        assert_eq!(r.explanation, "Full package price: 1,200");
    }

    #[test]
    fn batch_skips_unconfigured_and_totals_the_rest() {
        let domains = vec![
            domain(Some(PricingType::Full), Some(3000.0)),
            domain(None, None),
            domain(Some(PricingType::Percentage), Some(10.0)),
            domain(Some(PricingType::Unknown), Some(1.0)),
        ];
        let results = resolve_prices(&domains, Some(2000.0));
        assert_eq!(results.len(), 2);
        assert_eq!(total_price(&results), 3200.0);
        assert_eq!(total_price(&[]), 0.0);
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(200.0), "200");
        assert_eq!(format_amount(3000.0), "3,000");
        assert_eq!(format_amount(1234567.0), "1,234,567");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(-42.25), "-42.25");
    }
}
