//! Price resources.
//!
//! Prices are immutable once created remotely: apart from the activation
//! flag, any change means deactivating the old price and creating a new one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, ValidationError};

use super::resource::{require_non_empty, Properties, PropertyBag, Resource};

/// Billing interval of a recurring price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// Daily.
    Day,
    /// Weekly.
    Week,
    /// Monthly.
    Month,
    /// Yearly.
    Year,
}

impl Interval {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// How usage is reported for a recurring price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    /// Quantity set on the subscription.
    Licensed,
    /// Usage reported during the period.
    Metered,
}

impl UsageType {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Licensed => "licensed",
            Self::Metered => "metered",
        }
    }
}

/// Recurring component of a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurring {
    /// Billing interval.
    pub interval: Interval,
    /// Number of intervals between bills.
    #[serde(default)]
    pub interval_count: Option<u32>,
    /// Usage type.
    #[serde(default)]
    pub usage_type: Option<UsageType>,
    /// Trial length in days.
    #[serde(default)]
    pub trial_period_days: Option<u32>,
}

/// How tiers are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiersMode {
    /// Each unit is priced by the tier it falls in.
    Graduated,
    /// All units are priced by the final tier reached.
    Volume,
}

impl TiersMode {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graduated => "graduated",
            Self::Volume => "volume",
        }
    }
}

/// One pricing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Upper bound of the tier; `None` is the unbounded last tier ("inf").
    #[serde(default)]
    pub up_to: Option<u64>,
    /// Per-unit amount in minor units.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Flat amount for the tier in minor units.
    #[serde(default)]
    pub flat_amount: Option<i64>,
}

/// Rounding direction for quantity transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Round up.
    Up,
    /// Round down.
    Down,
}

impl Rounding {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Divides the reported quantity before billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformQuantity {
    /// Divisor.
    pub divide_by: u64,
    /// Rounding applied after division.
    pub round: Rounding,
}

/// Whether the amount includes tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxBehavior {
    /// Tax is included in the amount.
    Inclusive,
    /// Tax is added on top.
    Exclusive,
    /// Not specified.
    Unspecified,
}

impl TaxBehavior {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inclusive => "inclusive",
            Self::Exclusive => "exclusive",
            Self::Unspecified => "unspecified",
        }
    }
}

/// Properties of a price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceProps {
    /// Product reference: the logical id of a product declared earlier in
    /// the same stack, or the remote id of an existing product.
    pub product: String,
    /// Three-letter ISO currency code.
    pub currency: String,
    /// Whether the price can be used. Defaults to true.
    pub active: Option<bool>,
    /// Amount in minor units.
    pub unit_amount: Option<i64>,
    /// Amount in minor units with decimal precision.
    pub unit_amount_decimal: Option<String>,
    /// Internal nickname.
    pub nickname: Option<String>,
    /// Lookup key.
    pub lookup_key: Option<String>,
    /// User metadata.
    pub metadata: Option<BTreeMap<String, String>>,
    /// Recurring component.
    pub recurring: Option<Recurring>,
    /// Tiers; a non-empty list makes the price tiered.
    pub tiers: Option<Vec<PriceTier>>,
    /// Tier mode.
    pub tiers_mode: Option<TiersMode>,
    /// Quantity transform.
    pub transform_quantity: Option<TransformQuantity>,
    /// Tax behavior.
    pub tax_behavior: Option<TaxBehavior>,
}

impl PriceProps {
    /// Props referencing `product` by its logical id.
    #[must_use]
    pub fn for_product(product: &Resource, currency: &str) -> Self {
        Self {
            product: product.logical_id().to_string(),
            currency: currency.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        require_non_empty(path, "product", &self.product)?;
        require_non_empty(path, "currency", &self.currency)?;
        if let Some(transform) = &self.transform_quantity
            && transform.divide_by == 0
        {
            return Err(ValidationError::invalid_field(
                path,
                "transform_quantity.divide_by",
                "must be greater than zero",
            )
            .into());
        }
        Ok(())
    }

    pub(crate) fn to_properties(&self) -> Properties {
        let mut bag = PropertyBag::new();
        bag.insert("product", self.product.clone())
            .insert("currency", self.currency.clone())
            .insert("active", self.active.unwrap_or(true))
            .insert_opt("unit_amount", self.unit_amount)
            .insert_opt("unit_amount_decimal", self.unit_amount_decimal.clone())
            .insert_opt("nickname", self.nickname.clone())
            .insert_opt("lookup_key", self.lookup_key.clone())
            .insert_opt("recurring", self.recurring.as_ref().map(recurring_value))
            .insert_opt("tax_behavior", self.tax_behavior.map(TaxBehavior::as_str))
            .insert_metadata(self.metadata.as_ref());

        if let Some(tiers) = self.tiers.as_ref().filter(|t| !t.is_empty()) {
            bag.insert("billing_scheme", "tiered")
                .insert_opt("tiers_mode", self.tiers_mode.map(TiersMode::as_str))
                .insert("tiers", tiers.iter().map(tier_value).collect::<Vec<_>>());
        }

        if let Some(transform) = &self.transform_quantity {
            let mut nested = PropertyBag::new();
            nested
                .insert("divide_by", transform.divide_by)
                .insert("round", transform.round.as_str());
            bag.insert("transform_quantity", nested.build());
        }

        bag.build()
    }
}

fn recurring_value(recurring: &Recurring) -> Value {
    let mut bag = PropertyBag::new();
    bag.insert("interval", recurring.interval.as_str())
        .insert_opt("interval_count", recurring.interval_count)
        .insert_opt("usage_type", recurring.usage_type.map(UsageType::as_str))
        .insert_opt("trial_period_days", recurring.trial_period_days);
    Value::Object(bag.build())
}

fn tier_value(tier: &PriceTier) -> Value {
    let up_to = tier.up_to.map_or_else(|| Value::from("inf"), Value::from);
    let mut bag = PropertyBag::new();
    bag.insert("up_to", up_to)
        .insert_opt("unit_amount", tier.unit_amount)
        .insert_opt("flat_amount", tier.flat_amount);
    Value::Object(bag.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> PriceProps {
        PriceProps {
            product: String::from("MyProduct"),
            currency: String::from("usd"),
            ..PriceProps::default()
        }
    }

    #[test]
    fn test_minimal_price() {
        let props = PriceProps {
            unit_amount: Some(999),
            ..base()
        };

        assert_eq!(
            Value::Object(props.to_properties()),
            json!({ "product": "MyProduct", "currency": "usd", "active": true, "unit_amount": 999 })
        );
    }

    #[test]
    fn test_recurring_keys_are_renamed() {
        let props = PriceProps {
            unit_amount: Some(2000),
            recurring: Some(Recurring {
                interval: Interval::Month,
                interval_count: Some(3),
                usage_type: Some(UsageType::Metered),
                trial_period_days: Some(14),
            }),
            ..base()
        };

        let bag = props.to_properties();
        assert_eq!(
            bag["recurring"],
            json!({
                "interval": "month",
                "interval_count": 3,
                "usage_type": "metered",
                "trial_period_days": 14
            })
        );
    }

    #[test]
    fn test_tiers_force_tiered_scheme() {
        let props = PriceProps {
            tiers_mode: Some(TiersMode::Graduated),
            tiers: Some(vec![
                PriceTier {
                    up_to: Some(10),
                    unit_amount: Some(500),
                    flat_amount: Some(100),
                },
                PriceTier {
                    up_to: None,
                    unit_amount: Some(400),
                    flat_amount: None,
                },
            ]),
            ..base()
        };

        let bag = props.to_properties();
        assert_eq!(bag["billing_scheme"], json!("tiered"));
        assert_eq!(bag["tiers_mode"], json!("graduated"));
        assert_eq!(
            bag["tiers"],
            json!([
                { "up_to": 10, "unit_amount": 500, "flat_amount": 100 },
                { "up_to": "inf", "unit_amount": 400 }
            ])
        );
    }

    #[test]
    fn test_empty_tiers_are_ignored() {
        let props = PriceProps {
            tiers: Some(vec![]),
            tiers_mode: Some(TiersMode::Volume),
            ..base()
        };

        let bag = props.to_properties();
        assert!(!bag.contains_key("billing_scheme"));
        assert!(!bag.contains_key("tiers"));
        assert!(!bag.contains_key("tiers_mode"));
    }

    #[test]
    fn test_transform_quantity() {
        let props = PriceProps {
            transform_quantity: Some(TransformQuantity {
                divide_by: 1000,
                round: Rounding::Up,
            }),
            ..base()
        };

        assert_eq!(
            props.to_properties()["transform_quantity"],
            json!({ "divide_by": 1000, "round": "up" })
        );
        assert!(props.validate("Billing/Price").is_ok());

        let zero = PriceProps {
            transform_quantity: Some(TransformQuantity {
                divide_by: 0,
                round: Rounding::Down,
            }),
            ..base()
        };
        assert!(zero.validate("Billing/Price").is_err());
    }
}
