use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::{currencies::Currency, plan_types::PlanType};

const MONTHLY_FEATURES: [&str; 9] = [
    "AI symptom checker",
    "Disease prediction",
    "Personalized diet plans",
    "Digital prescriptions",
    "Unlimited AI vet chat",
    "Pet health records",
    "Vaccination reminders",
    "Multiple pet profiles",
    "Email support",
];

const YEARLY_EXTRA_FEATURES: [&str; 2] = ["Annual health report", "Priority vet consultations"];

/// Prices (minor units) and feature entitlements for every paid plan.
///
/// Built once at startup and validated so that every plan has a price in
/// every supported currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanCatalog {
    prices: BTreeMap<PlanType, BTreeMap<Currency, i64>>,
    features: BTreeMap<PlanType, Vec<String>>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let prices = BTreeMap::from([
            (
                PlanType::Monthly,
                BTreeMap::from([
                    (Currency::Inr, 39_900),
                    (Currency::Usd, 499),
                    (Currency::Eur, 449),
                    (Currency::Gbp, 399),
                ]),
            ),
            (
                PlanType::Yearly,
                BTreeMap::from([
                    (Currency::Inr, 450_000),
                    (Currency::Usd, 5_499),
                    (Currency::Eur, 4_999),
                    (Currency::Gbp, 4_399),
                ]),
            ),
        ]);

        let monthly: Vec<String> = MONTHLY_FEATURES.iter().map(|f| f.to_string()).collect();
        let yearly: Vec<String> = monthly
            .iter()
            .cloned()
            .chain(YEARLY_EXTRA_FEATURES.iter().map(|f| f.to_string()))
            .collect();

        let features = BTreeMap::from([(PlanType::Monthly, monthly), (PlanType::Yearly, yearly)]);

        Self { prices, features }
    }
}

impl PlanCatalog {
    pub fn new(
        prices: BTreeMap<PlanType, BTreeMap<Currency, i64>>,
        features: BTreeMap<PlanType, Vec<String>>,
    ) -> Result<Self> {
        let catalog = Self { prices, features };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses a JSON catalog such as
    /// `{"prices": {"monthly": {"INR": 39900, ...}, ...}, "features": {"monthly": [...], ...}}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let catalog: PlanCatalog =
            serde_json::from_str(raw).context("plan catalog is not valid JSON")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        for plan in PlanType::ALL {
            let prices = self
                .prices
                .get(&plan)
                .with_context(|| format!("plan catalog has no prices for {plan}"))?;

            for currency in Currency::ALL {
                match prices.get(&currency) {
                    Some(amount) if *amount > 0 => {}
                    Some(amount) => {
                        bail!("plan catalog price for {plan}/{currency} must be positive, got {amount}")
                    }
                    None => bail!("plan catalog is missing a price for {plan}/{currency}"),
                }
            }

            match self.features.get(&plan) {
                Some(features) if !features.is_empty() => {}
                _ => bail!("plan catalog has no features for {plan}"),
            }
        }

        let monthly = self.features(PlanType::Monthly);
        let yearly = self.features(PlanType::Yearly);
        if let Some(missing) = monthly.iter().find(|f| !yearly.contains(f)) {
            bail!("yearly plan must include every monthly feature, missing {missing:?}");
        }

        Ok(())
    }

    pub fn price_minor(&self, plan: PlanType, currency: Currency) -> Option<i64> {
        self.prices.get(&plan)?.get(&currency).copied()
    }

    pub fn features(&self, plan: PlanType) -> &[String] {
        self.features
            .get(&plan)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_complete() {
        let catalog = PlanCatalog::default();
        assert!(catalog.validate().is_ok());

        for plan in PlanType::ALL {
            for currency in Currency::ALL {
                assert!(catalog.price_minor(plan, currency).is_some());
            }
        }
    }

    #[test]
    fn default_prices_match_published_table() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.price_minor(PlanType::Monthly, Currency::Inr), Some(39_900));
        assert_eq!(catalog.price_minor(PlanType::Monthly, Currency::Usd), Some(499));
        assert_eq!(catalog.price_minor(PlanType::Monthly, Currency::Eur), Some(449));
        assert_eq!(catalog.price_minor(PlanType::Monthly, Currency::Gbp), Some(399));
        assert_eq!(catalog.price_minor(PlanType::Yearly, Currency::Inr), Some(450_000));
        assert_eq!(catalog.price_minor(PlanType::Yearly, Currency::Usd), Some(5_499));
        assert_eq!(catalog.price_minor(PlanType::Yearly, Currency::Eur), Some(4_999));
        assert_eq!(catalog.price_minor(PlanType::Yearly, Currency::Gbp), Some(4_399));
    }

    #[test]
    fn yearly_features_extend_monthly_by_two() {
        let catalog = PlanCatalog::default();
        let monthly = catalog.features(PlanType::Monthly);
        let yearly = catalog.features(PlanType::Yearly);

        assert_eq!(monthly.len(), 9);
        assert_eq!(yearly.len(), 11);
        assert_eq!(&yearly[..9], monthly);
    }

    #[test]
    fn missing_currency_is_rejected() {
        let mut catalog = PlanCatalog::default();
        catalog
            .prices
            .get_mut(&PlanType::Yearly)
            .unwrap()
            .remove(&Currency::Gbp);

        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("yearly/GBP"));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let mut catalog = PlanCatalog::default();
        catalog
            .prices
            .get_mut(&PlanType::Monthly)
            .unwrap()
            .insert(Currency::Usd, 0);

        assert!(catalog.validate().is_err());
    }

    #[test]
    fn yearly_must_cover_monthly_features() {
        let mut features = PlanCatalog::default().features;
        features.insert(PlanType::Yearly, vec!["Annual health report".to_string()]);

        let result = PlanCatalog::new(PlanCatalog::default().prices, features);
        assert!(result.is_err());
    }

    #[test]
    fn json_catalog_is_parsed_and_validated() {
        let raw = r#"{
            "prices": {
                "monthly": {"INR": 100, "USD": 2, "EUR": 2, "GBP": 1},
                "yearly": {"INR": 1000, "USD": 20, "EUR": 18, "GBP": 15}
            },
            "features": {
                "monthly": ["Chat"],
                "yearly": ["Chat", "Report"]
            }
        }"#;

        let catalog = PlanCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.price_minor(PlanType::Yearly, Currency::Eur), Some(18));
        assert_eq!(catalog.features(PlanType::Yearly), ["Chat", "Report"]);

        let incomplete = r#"{"prices": {"monthly": {"INR": 100}}, "features": {}}"#;
        assert!(PlanCatalog::from_json(incomplete).is_err());
    }
}
