//! Normalization of remote objects into comparable property bags.
//!
//! [`normalize`] is the inverse of property bag derivation: it keeps only the
//! user-configurable fields of a remote object. [`comparable`] then strips
//! server defaults so that a desired bag and a normalized remote object can be
//! compared with plain structural equality.

use serde_json::{json, Value};

use crate::construct::{Properties, ResourceKind, DEFAULT_CUSTOMER_MAPPING_TYPE};

use super::resolver::{LEGACY_LOGICAL_ID_TAG, LOGICAL_ID_TAG, PATH_TAG};

const PRODUCT_FIELDS: &[&str] = &[
    "name",
    "active",
    "description",
    "images",
    "url",
    "unit_label",
    "statement_descriptor",
    "tax_code",
    "metadata",
];

const PRICE_FIELDS: &[&str] = &[
    "product",
    "currency",
    "active",
    "unit_amount",
    "unit_amount_decimal",
    "nickname",
    "lookup_key",
    "metadata",
    "recurring",
    "billing_scheme",
    "tiers_mode",
    "tiers",
    "transform_quantity",
    "tax_behavior",
];

/// Price fields that decide between reuse and replacement.
///
/// `product` is compared separately, see [`comparable`].
pub const PRICE_COMPARED_FIELDS: &[&str] = &[
    "currency",
    "unit_amount",
    "unit_amount_decimal",
    "active",
    "nickname",
    "recurring",
    "billing_scheme",
    "tiers_mode",
    "tiers",
    "transform_quantity",
    "lookup_key",
    "tax_behavior",
];

const COUPON_FIELDS: &[&str] = &[
    "duration",
    "amount_off",
    "percent_off",
    "currency",
    "duration_in_months",
    "name",
    "max_redemptions",
    "redeem_by",
    "metadata",
];

const FEATURE_FIELDS: &[&str] = &["name", "lookup_key", "metadata"];

const METER_FIELDS: &[&str] = &[
    "display_name",
    "event_name",
    "default_aggregation",
    "customer_mapping",
    "event_time_window",
    "value_settings",
];

const fn fields(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Product => PRODUCT_FIELDS,
        ResourceKind::Price => PRICE_FIELDS,
        ResourceKind::Coupon => COUPON_FIELDS,
        ResourceKind::EntitlementFeature => FEATURE_FIELDS,
        ResourceKind::BillingMeter => METER_FIELDS,
    }
}

/// Extracts the user-configurable fields of a remote object.
///
/// Server-computed fields and nulls are dropped, identity tags are removed
/// from `metadata`, and `metadata` itself is omitted when no user keys
/// remain.
#[must_use]
pub fn normalize(kind: ResourceKind, remote: &Value) -> Properties {
    let mut bag = Properties::new();
    for field in fields(kind) {
        if let Some(value) = remote.get(*field).filter(|v| !v.is_null()) {
            bag.insert((*field).to_string(), value.clone());
        }
    }

    match kind {
        ResourceKind::Price => normalize_price(&mut bag),
        ResourceKind::BillingMeter => {
            reshape(&mut bag, "default_aggregation", &["formula"]);
            reshape(&mut bag, "customer_mapping", &["event_payload_key", "type"]);
            reshape(&mut bag, "value_settings", &["event_payload_key"]);
        }
        _ => {}
    }

    if let Some(metadata) = bag.remove("metadata").and_then(|m| strip_identity_tags(&m)) {
        bag.insert(String::from("metadata"), metadata);
    }

    bag
}

fn normalize_price(bag: &mut Properties) {
    // An expanded product is reduced to its id.
    if let Some(id) = bag
        .get("product")
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
    {
        bag.insert(String::from("product"), Value::String(id));
    }

    reshape(
        bag,
        "recurring",
        &["interval", "interval_count", "usage_type", "trial_period_days"],
    );
    reshape(bag, "transform_quantity", &["divide_by", "round"]);

    if let Some(Value::Array(tiers)) = bag.get("tiers") {
        let tiers: Vec<Value> = tiers
            .iter()
            .map(|tier| {
                let mut shaped = pick(tier, &["up_to", "unit_amount", "flat_amount"]);
                let up_to = shaped.get("up_to").cloned().unwrap_or(Value::Null);
                shaped.insert(
                    String::from("up_to"),
                    if up_to.is_null() { json!("inf") } else { up_to },
                );
                Value::Object(shaped)
            })
            .collect();
        bag.insert(String::from("tiers"), Value::Array(tiers));
    }
}

/// Keeps the non-null `keys` of `value`.
fn pick(value: &Value, keys: &[&str]) -> Properties {
    keys.iter()
        .filter_map(|key| {
            value
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| ((*key).to_string(), v.clone()))
        })
        .collect()
}

fn reshape(bag: &mut Properties, field: &str, keys: &[&str]) {
    if let Some(value) = bag.get(field) {
        let shaped = pick(value, keys);
        bag.insert(field.to_string(), Value::Object(shaped));
    }
}

fn strip_identity_tags(metadata: &Value) -> Option<Value> {
    let Value::Object(map) = metadata else {
        return None;
    };
    let user: Properties = map
        .iter()
        .filter(|(key, _)| {
            !matches!(key.as_str(), LOGICAL_ID_TAG | PATH_TAG | LEGACY_LOGICAL_ID_TAG)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (!user.is_empty()).then_some(Value::Object(user))
}

/// Removes fields equal to the server default for `kind`.
pub fn strip_defaults(kind: ResourceKind, bag: &mut Properties) {
    remove_if(bag, "metadata", |v| v.as_object().is_some_and(serde_json::Map::is_empty));
    remove_if(bag, "images", |v| v.as_array().is_some_and(Vec::is_empty));

    match kind {
        ResourceKind::Price => {
            remove_if(bag, "billing_scheme", |v| *v == "per_unit");
            remove_if(bag, "tax_behavior", |v| *v == "unspecified");
            fold_unit_amount(bag);
            if let Some(Value::Object(recurring)) = bag.get_mut("recurring") {
                remove_if(recurring, "interval_count", |v| v.as_u64() == Some(1));
                remove_if(recurring, "usage_type", |v| *v == "licensed");
            }
        }
        ResourceKind::BillingMeter => {
            remove_if(bag, "customer_mapping", |v| {
                *v == json!({
                    "event_payload_key": "stripe_customer_id",
                    "type": DEFAULT_CUSTOMER_MAPPING_TYPE
                })
            });
            remove_if(bag, "value_settings", |v| *v == json!({ "event_payload_key": "value" }));
        }
        _ => {}
    }
}

/// Collapses the two amount spellings into one.
///
/// An integral `unit_amount_decimal` becomes `unit_amount`, and the decimal
/// is dropped whenever `unit_amount` is present.
#[allow(clippy::cast_possible_truncation)]
fn fold_unit_amount(bag: &mut Properties) {
    if !bag.contains_key("unit_amount")
        && let Some(amount) = bag
            .get("unit_amount_decimal")
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
    {
        bag.insert(String::from("unit_amount"), Value::from(amount as i64));
    }
    if bag.contains_key("unit_amount") {
        bag.remove("unit_amount_decimal");
    }
}

fn remove_if(bag: &mut Properties, key: &str, predicate: impl Fn(&Value) -> bool) {
    if bag.get(key).is_some_and(|v| predicate(v)) {
        bag.remove(key);
    }
}

/// The form of a bag used for comparison.
///
/// Prices are projected onto [`PRICE_COMPARED_FIELDS`], plus `product` when
/// `with_product` is set; every kind has its defaults stripped and integral
/// floats folded into integers.
#[must_use]
pub fn comparable(kind: ResourceKind, bag: &Properties, with_product: bool) -> Properties {
    let mut out: Properties = if kind == ResourceKind::Price {
        bag.iter()
            .filter(|(k, _)| {
                PRICE_COMPARED_FIELDS.contains(&k.as_str()) || (with_product && *k == "product")
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        bag.clone()
    };
    strip_defaults(kind, &mut out);
    out.into_iter().map(|(k, v)| (k, fold_numbers(v))).collect()
}

/// Returns true if `desired` and the normalized `existing` bag match.
///
/// `with_product` is only meaningful for prices: set it once the desired
/// `product` holds a remote id, so a price under another product is replaced.
#[must_use]
pub fn bags_equal(
    kind: ResourceKind,
    desired: &Properties,
    existing: &Properties,
    with_product: bool,
) -> bool {
    comparable(kind, desired, with_product) == comparable(kind, existing, with_product)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn fold_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(fold_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, fold_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}
