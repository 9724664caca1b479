//! Lint checks for synthesized manifests.
//!
//! Nothing here blocks a deploy. The checks report declarations that are
//! legal but will probably not do what the author meant.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::construct::{ResourceKind, StackManifest};

/// Lint pass over a manifest.
#[derive(Debug, Default)]
pub struct ManifestValidator;

/// Result of a lint pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Warnings, in manifest order.
    pub warnings: Vec<LintWarning>,
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    /// Path of the resource the finding is about.
    pub path: String,
    /// The warning message.
    pub message: String,
}

impl ValidationReport {
    /// Returns true when nothing was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, path: &str, message: String) {
        self.warnings.push(LintWarning {
            path: path.to_string(),
            message,
        });
    }
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Lints `manifest`.
    #[must_use]
    pub fn validate(&self, manifest: &StackManifest) -> ValidationReport {
        let mut report = ValidationReport::default();

        Self::check_duplicate_ids(manifest, &mut report);
        Self::check_reference_order(manifest, &mut report);
        Self::check_price_products(manifest, &mut report);

        for warning in &report.warnings {
            warn!("{}: {}", warning.path, warning.message);
        }
        if report.is_clean() {
            debug!("Manifest lint passed");
        }
        report
    }

    /// Logical ids key the state file, so they must be unique per stack even
    /// across different groups.
    fn check_duplicate_ids(manifest: &StackManifest, report: &mut ValidationReport) {
        let mut first_path: HashMap<&str, &str> = HashMap::new();
        for entry in &manifest.resources {
            if let Some(previous) = first_path.get(entry.id.as_str()) {
                report.warn(
                    &entry.path,
                    format!(
                        "logical id '{}' is also used by {previous}; both share one state entry",
                        entry.id
                    ),
                );
            } else {
                first_path.insert(&entry.id, &entry.path);
            }
        }
    }

    /// Top-level strings naming a logical id declared later cannot be
    /// substituted during deploy.
    fn check_reference_order(manifest: &StackManifest, report: &mut ValidationReport) {
        let all: HashSet<&str> = manifest.resources.iter().map(|e| e.id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for entry in &manifest.resources {
            for (field, value) in &entry.properties {
                if let Some(target) = value.as_str()
                    && target != entry.id
                    && all.contains(target)
                    && !seen.contains(target)
                {
                    report.warn(
                        &entry.path,
                        format!(
                            "field '{field}' references '{target}', which is declared later; \
                             declare it first so its remote id can be substituted"
                        ),
                    );
                }
            }
            seen.insert(&entry.id);
        }
    }

    /// A price product that is neither a declared logical id nor a remote
    /// product id is almost certainly a typo.
    fn check_price_products(manifest: &StackManifest, report: &mut ValidationReport) {
        for entry in manifest
            .resources
            .iter()
            .filter(|e| e.kind == ResourceKind::Price)
        {
            let Some(product) = entry.properties.get("product").and_then(|v| v.as_str()) else {
                continue;
            };
            let declared = manifest
                .entry(product)
                .is_some_and(|target| target.kind == ResourceKind::Product);
            if !declared && !product.starts_with("prod_") {
                report.warn(
                    &entry.path,
                    format!("product '{product}' is not a product declared in this stack"),
                );
            }
        }
    }
}
