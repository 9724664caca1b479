// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # billstack
//!
//! Declarative infrastructure-as-code for Stripe billing primitives.
//!
//! ## Overview
//!
//! billstack lets you describe products, prices, coupons, entitlement
//! features and billing meters as a tree of constructs, and then:
//!
//! - Synthesize the tree into a flat, ordered manifest
//! - Diff the manifest against what exists in the Stripe account
//! - Deploy it idempotently, finding existing objects by their identity tags
//! - Destroy it in reverse order, deleting or deactivating as the API allows
//!
//! ## Architecture
//!
//! 1. **Constructs**: the tree built from code or `billstack.yaml`
//! 2. **Manifest**: the synthesized resource list, in apply order
//! 3. **State**: logical id to remote id mapping with content hashes
//! 4. **Deployer**: finds, compares and applies each entry in turn
//!
//! ## Modules
//!
//! - [`construct`]: Construct tree, resource kinds and synthesis
//! - [`config`]: Definition file parsing and manifest lint
//! - [`state`]: Local JSON state store
//! - [`stripe`]: Provider trait and Stripe HTTP client
//! - [`planner`]: Lookup, normalization and diff computation
//! - [`deployer`]: Deploy and destroy engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! stack:
//!   id: Billing
//!   api_version: "2024-06-20"
//!
//! constructs:
//!   - type: Product
//!     id: Pro
//!     name: Pro plan
//!   - type: Price
//!     id: ProMonthly
//!     product: Pro
//!     currency: usd
//!     unit_amount: 2000
//!     recurring:
//!       interval: month
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod construct;
pub mod deployer;
pub mod error;
pub mod planner;
pub mod state;
pub mod stripe;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{DefinitionFile, DefinitionParser, ManifestValidator};
pub use construct::{Construct, Resource, ResourceKind, Stack, StackConfig, StackManifest};
pub use deployer::{DeployOptions, DeployResult, Deployer, DestroyResult};
pub use error::{BillstackError, Result};
pub use planner::{DiffEngine, DiffResult};
pub use state::StateStore;
pub use stripe::{BillingProvider, StripeClient};
