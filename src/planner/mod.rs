//! Planning module for reconciliation.
//!
//! This module locates the remote object behind each manifest entry,
//! normalizes it into a comparable property bag and computes the diff
//! between desired and observed state.

mod diff;
mod normalize;
mod patch;
mod resolver;

pub use diff::{DiffEngine, DiffResult, DiffType, ResourceDiff};
pub use normalize::{bags_equal, comparable, normalize, strip_defaults, PRICE_COMPARED_FIELDS};
pub use patch::render_patch;
pub use resolver::{
    business_key, escape_query_value, is_active, logical_id_query, unescape_query_value, Resolver,
    LEGACY_LOGICAL_ID_TAG, LIST_PAGE_SIZE, LOGICAL_ID_TAG, PATH_TAG,
};
