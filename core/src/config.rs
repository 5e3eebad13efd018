use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::command::{CommandTemplate, DEFAULT_COMMAND};
use crate::error::BuildResult;
use crate::parser::LogLevel;

pub const CONFIG_FILE_NAME: &str = "slidedex.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub skeletons: BTreeMap<String, String>,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_command")]
    pub slide: String,
    #[serde(default = "default_command")]
    pub presentation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    #[serde(default = "default_basename_prefix")]
    pub basename_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_min_level")]
    pub min_level: String,
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands: CommandsConfig::default(),
            build: BuildConfig::default(),
            skeletons: BTreeMap::new(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            slide: default_command(),
            presentation: default_command(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            source_extension: default_source_extension(),
            artifact_extension: default_artifact_extension(),
            basename_prefix: default_basename_prefix(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            show_timestamps: true,
        }
    }
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_extension() -> String {
    "tex".to_string()
}

fn default_artifact_extension() -> String {
    "pdf".to_string()
}

fn default_basename_prefix() -> String {
    "ztmp".to_string()
}

fn default_min_level() -> String {
    "info".to_string()
}

impl LogsConfig {
    pub fn level(&self) -> LogLevel {
        LogLevel::from_str(&self.min_level).unwrap_or(LogLevel::Info)
    }
}

impl CommandsConfig {
    pub fn slide_template(&self) -> BuildResult<CommandTemplate> {
        CommandTemplate::parse(&self.slide)
    }

    pub fn presentation_template(&self) -> BuildResult<CommandTemplate> {
        CommandTemplate::parse(&self.presentation)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    // Global config overlaid by the one next to the document, if any.
    pub fn load_for_document(document: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(explicit) = explicit {
            return Self::load_from_file(explicit);
        }

        let global = Self::load_from_file(Self::global_path())?;
        let local_path = document
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME);

        if !local_path.exists() {
            return Ok(global);
        }

        let content = std::fs::read_to_string(&local_path)
            .with_context(|| format!("Failed to read config file: {}", local_path.display()))?;
        let local: toml::Table = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", local_path.display()))?;

        global.merge_with(local)
    }

    pub fn merge_with(self, overrides: toml::Table) -> anyhow::Result<Self> {
        let mut base = match toml::Value::try_from(&self).context("Failed to serialize config")? {
            toml::Value::Table(table) => table,
            _ => anyhow::bail!("config did not serialize to a table"),
        };

        for (section, value) in overrides {
            match (base.get_mut(&section), value) {
                (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    base.insert(section, value);
                }
            }
        }

        toml::Value::Table(base)
            .try_into()
            .context("Failed to merge config files")
    }

    pub fn global_path() -> PathBuf {
        Self::expand_path("~/.config/slidedex/slidedex.toml")
    }

    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.as_ref())
    }

    pub fn skeletons(&self) -> BTreeMap<String, String> {
        let mut skeletons = self.skeletons.clone();
        skeletons.entry("blank".to_string()).or_default();
        skeletons
    }

    pub fn skeleton(&self, name: &str) -> Option<String> {
        self.skeletons().remove(name)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}
