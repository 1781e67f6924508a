use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eavom::{Datatype, RedisStore, validators::ValueRule};
use regex::Regex;
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = ".eavom";
const CONFIG_FILE: &str = "config.toml";

/// Where the CLI found its configuration, and what it contains.
pub struct ProjectContext {
    pub config_path: PathBuf,
    pub config: EavomConfig,
}

/// Contents of `.eavom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EavomConfig {
    #[serde(default)]
    pub eavom: EavomSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub enum_groups: Vec<EnumGroupSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EavomSettings {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for EavomSettings {
    fn default() -> Self {
        Self { prefix: default_prefix() }
    }
}

fn default_prefix() -> String {
    "eavom".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self { url: default_redis_url() }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

/// Declarative enum group: `[[enum_groups]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumGroupSpec {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Declarative attribute: `[[attributes]]`. The enum group is referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub datatype: Datatype,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enum_group: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub rules: Vec<ValueRule>,
}

fn default_namespace() -> String {
    eavom::DEFAULT_ATTRIBUTE_NAMESPACE.to_string()
}

impl ProjectContext {
    /// Loads the config at `explicit`, or searches for `.eavom/config.toml`
    /// from the current directory upward.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let current_dir = std::env::current_dir().context("Failed to get current directory")?;
                Self::find_config(&current_dir)?
            }
        };
        Self::from_path(config_path)
    }

    pub fn from_path(config_path: PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: EavomConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(Self { config_path, config })
    }

    fn find_config(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                anyhow::bail!(
                    "Could not find {CONFIG_DIR}/{CONFIG_FILE} in {start:?} or any parent directory. \
                     Pass --config to point at one."
                );
            }
        }
    }

    /// The Redis URL with `${VAR}` references expanded from the environment.
    pub fn redis_url(&self) -> Result<String> {
        expand_env(&self.config.redis.url)
    }

    pub fn prefix(&self) -> &str {
        &self.config.eavom.prefix
    }

    pub fn open_store(&self) -> Result<RedisStore> {
        let url = self.redis_url()?;
        RedisStore::connect(&url, self.prefix()).with_context(|| format!("Failed to connect to Redis at {url}"))
    }
}

fn expand_env(raw: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
    let mut expanded = String::with_capacity(raw.len());
    let mut last = 0;
    for captures in pattern.captures_iter(raw) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        expanded.push_str(&raw[last..whole.start()]);
        let value = std::env::var(name.as_str())
            .with_context(|| format!("Environment variable {} not set", name.as_str()))?;
        expanded.push_str(&value);
        last = whole.end();
    }
    expanded.push_str(&raw[last..]);
    Ok(expanded)
}
