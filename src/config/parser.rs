//! Definition parser for loading `billstack.yaml`.
//!
//! This module handles loading definitions from YAML files and the `.env`
//! file, with proper error handling.

use crate::error::{BillstackError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::definition::DefinitionFile;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "STRIPE_API_KEY";

/// Parser for loading definition files.
#[derive(Debug, Default)]
pub struct DefinitionParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl DefinitionParser {
    /// Creates a new definition parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a definition from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DefinitionFile> {
        let path = path.as_ref();
        info!("Loading definition from: {}", path.display());

        if !path.exists() {
            return Err(BillstackError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            BillstackError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a definition from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or the settings are unusable.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DefinitionFile> {
        debug!("Parsing YAML definition");

        let mut definition: DefinitionFile = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            BillstackError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        let base = self
            .base_path
            .clone()
            .or_else(|| source.and_then(Path::parent).map(Path::to_path_buf));
        if let Some(base) = base {
            definition.settings = definition.settings.relative_to(&base);
        }
        definition.settings.validate()?;

        debug!(
            "Parsed definition for stack {} with {} top-level constructs",
            definition.stack.id,
            definition.constructs.len()
        );
        Ok(definition)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                BillstackError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Returns the API key, failing when none was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if `api_key` is `None` or blank.
    pub fn require_api_key(api_key: Option<String>) -> Result<String> {
        api_key.filter(|key| !key.trim().is_empty()).ok_or_else(|| {
            BillstackError::Config(ConfigError::MissingEnvVar {
                name: API_KEY_ENV.to_string(),
            })
        })
    }
}

/// Default definition file names to search for.
pub const DEFAULT_DEFINITION_FILES: &[&str] = &["billstack.yaml", "billstack.yml"];

/// Finds the definition file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no definition file is found.
pub fn find_definition_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_DEFINITION_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found definition file: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(BillstackError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_DEFINITION_FILES[0]),
    }))
}
