//! Configuration module for billstack.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `billstack.yaml` definitions into a construct tree
//! - Project settings and `.env` loading
//! - Lint checks on synthesized manifests

mod definition;
mod parser;
mod validator;

pub use definition::{
    ConstructDefinition, DefinitionFile, ResourceDefinition, Settings, StackDefinition,
    DEFAULT_MANIFEST_PATH, DEFAULT_STATE_PATH,
};
pub use parser::{find_definition_file, DefinitionParser, API_KEY_ENV, DEFAULT_DEFINITION_FILES};
pub use validator::{LintWarning, ManifestValidator, ValidationReport};
