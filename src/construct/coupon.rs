//! Coupon resources.
//!
//! Coupons use their logical id as the remote id, so there is no separate
//! physical id to track.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, ValidationError};

use super::resource::{Properties, PropertyBag};

/// How long a coupon applies once redeemed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponDuration {
    /// Applies forever.
    Forever,
    /// Applies to a single invoice.
    #[default]
    Once,
    /// Applies for `duration_in_months`.
    Repeating,
}

impl CouponDuration {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forever => "forever",
            Self::Once => "once",
            Self::Repeating => "repeating",
        }
    }
}

/// Properties of a coupon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouponProps {
    /// Duration.
    pub duration: CouponDuration,
    /// Fixed discount in minor units; requires `currency`.
    pub amount_off: Option<i64>,
    /// Percentage discount.
    pub percent_off: Option<f64>,
    /// Currency of `amount_off`.
    pub currency: Option<String>,
    /// Months a repeating coupon applies for.
    pub duration_in_months: Option<u32>,
    /// Display name.
    pub name: Option<String>,
    /// Maximum number of redemptions.
    pub max_redemptions: Option<u32>,
    /// Unix timestamp after which the coupon cannot be redeemed.
    pub redeem_by: Option<i64>,
    /// User metadata.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CouponProps {
    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        let resource = path.to_string();
        match (self.amount_off, self.percent_off) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::AmountAndPercentExclusive { resource }.into());
            }
            (None, None) => {
                return Err(ValidationError::AmountOrPercentRequired { resource }.into());
            }
            _ => {}
        }
        if self.duration == CouponDuration::Repeating && self.duration_in_months.is_none() {
            return Err(ValidationError::DurationInMonthsRequired { resource }.into());
        }
        if self.amount_off.is_some() && self.currency.is_none() {
            return Err(ValidationError::CurrencyRequired { resource }.into());
        }
        if let Some(percent) = self.percent_off
            && !(percent > 0.0 && percent <= 100.0)
        {
            return Err(ValidationError::invalid_field(
                path,
                "percent_off",
                "must be in (0, 100]",
            )
            .into());
        }
        Ok(())
    }

    pub(crate) fn to_properties(&self) -> Properties {
        let mut bag = PropertyBag::new();
        bag.insert("duration", self.duration.as_str())
            .insert_opt("amount_off", self.amount_off)
            .insert_opt("percent_off", self.percent_off.map(percent_value))
            .insert_opt("currency", self.currency.clone())
            .insert_opt("duration_in_months", self.duration_in_months)
            .insert_opt("name", self.name.clone())
            .insert_opt("max_redemptions", self.max_redemptions)
            .insert_opt("redeem_by", self.redeem_by)
            .insert_metadata(self.metadata.as_ref());
        bag.build()
    }
}

/// Whole percentages are written as integers, matching what the API returns.
#[allow(clippy::cast_possible_truncation)]
fn percent_value(percent: f64) -> Value {
    if percent.fract() == 0.0 {
        Value::from(percent as i64)
    } else {
        Value::from(percent)
    }
}
