// src/derive.rs
//! # Derivation Engine
//! Pure functions that turn raw feed attributes into the published metrics:
//! the fee-adjusted effective rate and the example-cost display string.
//! Both are computed against a fixed reference loan. No I/O.

use std::collections::BTreeMap;

use crate::locale::group_thousands;

pub const REFERENCE_PRINCIPAL: f64 = 3_000_000.0;
pub const REFERENCE_TERM_YEARS: u32 = 25;
pub const INSTALLMENTS_PER_YEAR: u32 = 12;

pub const ATTR_ACCOUNT_FEE: &str = "depotgebyr";
pub const ATTR_INSTALLMENT_FEE: &str = "termingebyr_1_a";
pub const ATTR_NOMINAL_RATE: &str = "nominell_rente_1_a";

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub effective_rate_percent: f64,
    pub example_cost_text: String,
}

impl DerivedMetrics {
    pub fn for_attributes(attributes: &BTreeMap<String, String>) -> Self {
        let effective_rate_percent = compute_effective_rate(attributes);
        let example_cost_text = compute_example_cost_text(
            REFERENCE_PRINCIPAL,
            REFERENCE_TERM_YEARS,
            effective_rate_percent,
        );
        Self {
            effective_rate_percent,
            example_cost_text,
        }
    }
}

/// Parse a raw numeric attribute. Missing or blank is `Ok(0.0)`; text that is
/// present but not a finite number is an `Err` carrying the raw value.
pub fn parse_amount(raw: Option<&str>) -> Result<f64, String> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(0.0);
    };
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(text.to_string()),
    }
}

fn amount_or_zero(attributes: &BTreeMap<String, String>, key: &str) -> f64 {
    match parse_amount(attributes.get(key).map(String::as_str)) {
        Ok(v) => v,
        Err(raw) => {
            tracing::warn!(target: "derive", field = key, raw = %raw, "unparseable amount, using 0");
            0.0
        }
    }
}

/// Effective annual rate (percent) for the reference loan with fees folded into
/// the principal. Never fails: anything non-finite collapses to 0.0.
pub fn compute_effective_rate(attributes: &BTreeMap<String, String>) -> f64 {
    let account_fee = amount_or_zero(attributes, ATTR_ACCOUNT_FEE);
    let installment_fee = amount_or_zero(attributes, ATTR_INSTALLMENT_FEE);
    let nominal_rate = amount_or_zero(attributes, ATTR_NOMINAL_RATE) / 100.0;

    let installments = INSTALLMENTS_PER_YEAR as f64;
    let total_fees =
        account_fee + installment_fee * installments * REFERENCE_TERM_YEARS as f64;
    let adjusted_principal = REFERENCE_PRINCIPAL + total_fees;
    let adjusted_nominal_rate = (adjusted_principal / REFERENCE_PRINCIPAL) * nominal_rate;
    let effective = (1.0 + adjusted_nominal_rate / installments).powf(installments) - 1.0;
    let percent = effective * 100.0;

    if percent.is_finite() {
        percent
    } else {
        tracing::error!(
            target: "derive",
            account_fee,
            installment_fee,
            nominal_rate,
            "effective rate is not finite, using 0"
        );
        0.0
    }
}

/// Interest cost and total repaid for an annuity loan, as
/// "Kostnad: <interest> kr, totalpris: <total> kr".
pub fn compute_example_cost_text(principal: f64, years: u32, effective_rate_percent: f64) -> String {
    let (interest_cost, total_cost) = example_costs(principal, years, effective_rate_percent);
    format!(
        "Kostnad: {} kr, totalpris: {} kr",
        group_thousands(interest_cost.round() as i64),
        group_thousands(total_cost.round() as i64)
    )
}

/// `(interest_cost, total_cost)`; a zero rate repays the principal in equal parts.
pub fn example_costs(principal: f64, years: u32, effective_rate_percent: f64) -> (f64, f64) {
    let rate = if effective_rate_percent.is_finite() {
        effective_rate_percent
    } else {
        0.0
    };
    let monthly_rate = rate / 12.0 / 100.0;
    let n = (years.max(1) * 12) as f64;

    let monthly_payment = if monthly_rate == 0.0 {
        principal / n
    } else {
        let growth = (1.0 + monthly_rate).powf(n);
        principal * (monthly_rate * growth) / (growth - 1.0)
    };

    let total_cost = monthly_payment * n;
    (total_cost - principal, total_cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_attributes_give_zero_rate() {
        assert_eq!(compute_effective_rate(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn nominal_rate_without_fees_compounds_monthly() {
        let a = attrs(&[("nominell_rente_1_a", "6.0")]);
        let expected = ((1.0 + 0.06 / 12.0_f64).powf(12.0) - 1.0) * 100.0;
        let got = compute_effective_rate(&a);
        assert!((got - expected).abs() < 1e-9, "got {got}");
        assert!((got - 6.1678).abs() < 1e-3);
    }

    #[test]
    fn fees_raise_the_effective_rate() {
        let base = attrs(&[("nominell_rente_1_a", "5.5")]);
        let with_fees = attrs(&[
            ("nominell_rente_1_a", "5.5"),
            ("termingebyr_1_a", "50"),
            ("depotgebyr", "1000"),
        ]);
        assert!(compute_effective_rate(&with_fees) > compute_effective_rate(&base));
    }

    #[test]
    fn blank_and_garbage_values_default_to_zero() {
        let a = attrs(&[
            ("nominell_rente_1_a", "5.0"),
            ("termingebyr_1_a", ""),
            ("depotgebyr", "n/a"),
        ]);
        let b = attrs(&[("nominell_rente_1_a", "5.0")]);
        assert_eq!(compute_effective_rate(&a), compute_effective_rate(&b));
    }

    #[test]
    fn rate_is_deterministic_and_non_negative() {
        let a = attrs(&[
            ("nominell_rente_1_a", "4.89"),
            ("termingebyr_1_a", "65"),
            ("depotgebyr", "0"),
        ]);
        let first = compute_effective_rate(&a);
        assert_eq!(first, compute_effective_rate(&a));
        assert!(first >= 0.0);
    }

    #[test]
    fn zero_rate_example_cost_has_no_interest() {
        let text = compute_example_cost_text(REFERENCE_PRINCIPAL, REFERENCE_TERM_YEARS, 0.0);
        assert_eq!(text, "Kostnad: 0 kr, totalpris: 3 000 000 kr");
    }

    #[test]
    fn example_cost_matches_annuity_formula() {
        let (interest, total) = example_costs(3_000_000.0, 25, 6.0);
        let r: f64 = 0.005;
        let growth = (1.0 + r).powf(300.0);
        let payment = 3_000_000.0 * r * growth / (growth - 1.0);
        assert!((total - payment * 300.0).abs() < 1e-6);
        assert!((interest - (total - 3_000_000.0)).abs() < 1e-6);
        let text = compute_example_cost_text(3_000_000.0, 25, 6.0);
        assert!(text.starts_with("Kostnad: "));
        assert!(text.ends_with(" kr"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn parse_amount_distinguishes_missing_from_garbage() {
        assert_eq!(parse_amount(None), Ok(0.0));
        assert_eq!(parse_amount(Some("  ")), Ok(0.0));
        assert_eq!(parse_amount(Some(" 2.5 ")), Ok(2.5));
        assert_eq!(parse_amount(Some("abc")), Err("abc".to_string()));
        assert!(parse_amount(Some("inf")).is_err());
    }
}
