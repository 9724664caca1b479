//! Billing meter resources.
//!
//! Meters are identified remotely by `event_name`. Only the display name can
//! change after creation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::resource::{require_non_empty, Properties, PropertyBag};

/// Customer mapping type used when none is given.
pub const DEFAULT_CUSTOMER_MAPPING_TYPE: &str = "by_id";

/// Aggregation formula over meter events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFormula {
    /// Sum event values.
    #[default]
    Sum,
    /// Count events.
    Count,
    /// Take the last value.
    Last,
}

impl AggregationFormula {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Last => "last",
        }
    }
}

/// Default aggregation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAggregation {
    /// Formula.
    pub formula: AggregationFormula,
}

/// Maps an event payload key to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMapping {
    /// Payload key holding the customer reference.
    pub event_payload_key: String,
    /// Mapping type; defaults to `by_id`.
    #[serde(default, rename = "type")]
    pub mapping_type: Option<String>,
}

/// Time window for pre-aggregated events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTimeWindow {
    /// Daily windows.
    Day,
    /// Hourly windows.
    Hour,
}

impl EventTimeWindow {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Hour => "hour",
        }
    }
}

/// Where the numeric value lives in the event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSettings {
    /// Payload key holding the value.
    pub event_payload_key: String,
}

/// Properties of a billing meter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingMeterProps {
    /// Display name.
    pub display_name: String,
    /// Event name, the meter's business key.
    pub event_name: String,
    /// Aggregation settings.
    pub default_aggregation: DefaultAggregation,
    /// Customer mapping.
    pub customer_mapping: Option<CustomerMapping>,
    /// Event time window.
    pub event_time_window: Option<EventTimeWindow>,
    /// Value settings.
    pub value_settings: Option<ValueSettings>,
}

impl BillingMeterProps {
    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        require_non_empty(path, "display_name", &self.display_name)?;
        require_non_empty(path, "event_name", &self.event_name)
    }

    pub(crate) fn to_properties(&self) -> Properties {
        let mut aggregation = PropertyBag::new();
        aggregation.insert("formula", self.default_aggregation.formula.as_str());

        let mut bag = PropertyBag::new();
        bag.insert("display_name", self.display_name.clone())
            .insert("event_name", self.event_name.clone())
            .insert("default_aggregation", aggregation.build())
            .insert_opt(
                "customer_mapping",
                self.customer_mapping.as_ref().map(customer_mapping_value),
            )
            .insert_opt(
                "event_time_window",
                self.event_time_window.map(EventTimeWindow::as_str),
            )
            .insert_opt(
                "value_settings",
                self.value_settings.as_ref().map(|v| {
                    let mut nested = PropertyBag::new();
                    nested.insert("event_payload_key", v.event_payload_key.clone());
                    Value::Object(nested.build())
                }),
            );
        bag.build()
    }
}

fn customer_mapping_value(mapping: &CustomerMapping) -> Value {
    let mut bag = PropertyBag::new();
    bag.insert("event_payload_key", mapping.event_payload_key.clone())
        .insert(
            "type",
            mapping
                .mapping_type
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_CUSTOMER_MAPPING_TYPE)),
        );
    Value::Object(bag.build())
}
