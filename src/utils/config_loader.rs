use crate::core::models::{Configuration, Mode, ModuleSpecifier, ResolveOptions};
use crate::utils::{BuildError, Logger, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "packrat.config.json";

const DEFAULT_ENTRY: &str = "./src";
const DEFAULT_OUTPUT_PATH: &str = "dist";
const DEFAULT_OUTPUT_FILENAME: &str = "main.js";

/// Configuration file format (packrat.config.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackratConfig {
    /// "development" or "production" (default: production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    /// Entry module specifier (default: "./src")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    /// Directory the entry is resolved against (default: the config file's directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Output filename; supports `[name]` and `[contenthash]` (default: "main.js")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Values given on the command line; each one beats the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub entry: Option<String>,
    pub context: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub filename: Option<String>,
    pub mode: Option<Mode>,
}

/// Config loader that supports config files with CLI override
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `packrat.config.json` from `root` if it exists
    pub fn load_from_file(root: &Path) -> Result<Option<PackratConfig>> {
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            Logger::debug(&format!("No {} found, using defaults", CONFIG_FILE_NAME));
            return Ok(None);
        }

        Self::load_from_path(&config_path).map(Some)
    }

    /// Load an explicitly named config file
    pub fn load_from_path(config_path: &Path) -> Result<PackratConfig> {
        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            BuildError::config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config: PackratConfig = serde_json::from_str(&content).map_err(|e| {
            BuildError::config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;

        Logger::debug("✅ Config file loaded successfully");
        Ok(config)
    }

    /// Merge file config with CLI arguments (CLI takes precedence).
    ///
    /// Relative paths from the file are taken relative to `base_dir`, the
    /// directory holding the config file, and come out absolute. Paths from
    /// the CLI are used as given.
    pub fn merge_with_cli(
        file_config: Option<PackratConfig>,
        base_dir: &Path,
        cli: CliOverrides,
    ) -> Result<Configuration> {
        let base_dir = std::path::absolute(base_dir).map_err(|e| {
            BuildError::config(format!("Invalid config directory {}: {}", base_dir.display(), e))
        })?;
        let base_dir = base_dir.as_path();
        let base = file_config.unwrap_or_default();
        let output = base.output.unwrap_or_default();

        let context = cli
            .context
            .or_else(|| base.context.map(|context| within(base_dir, context)))
            .unwrap_or_else(|| base_dir.to_path_buf());

        let entry = cli
            .entry
            .or(base.entry)
            .unwrap_or_else(|| DEFAULT_ENTRY.to_string());
        if entry.trim().is_empty() {
            return Err(BuildError::config("entry must not be empty"));
        }

        let output_directory = cli
            .output_path
            .or_else(|| output.path.map(|path| within(base_dir, path)))
            .unwrap_or_else(|| base_dir.join(DEFAULT_OUTPUT_PATH));

        let output_filename = cli
            .filename
            .or(output.filename)
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string());

        let mode = match cli.mode.or(base.mode) {
            Some(mode) => mode,
            None => {
                Logger::debug("No mode set, falling back to production");
                Mode::Production
            }
        };

        let mut resolve = base.resolve.unwrap_or_default();
        for target in resolve.alias.values_mut() {
            *target = within(base_dir, std::mem::take(target));
        }

        Ok(Configuration::new(
            ModuleSpecifier::new(entry),
            output_directory,
            output_filename,
            mode,
        )
        .with_context(context)
        .with_resolve(resolve))
    }

    /// Generate example config file
    pub fn generate_example() -> String {
        let example = PackratConfig {
            mode: Some(Mode::Production),
            entry: Some("./bootstrap".to_string()),
            context: None,
            output: Some(OutputConfig {
                path: Some(PathBuf::from(DEFAULT_OUTPUT_PATH)),
                filename: Some(DEFAULT_OUTPUT_FILENAME.to_string()),
            }),
            resolve: None,
        };
        serde_json::to_string_pretty(&example).unwrap_or_default()
    }
}

fn within(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
