//! # PMODial Configuration Module
//!
//! Configuration management for the PMODial crates:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters with defaults, setters that persist to disk
//! - Thread-safe singleton access
//!
//! Protocol crates do not read this module directly: they expose extension
//! traits (`SsdpConfigExt`, `DialConfigExt`) that turn the YAML tree into
//! the explicit configuration structures their components are built with.
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level();
//! config.set_u64(&["ssdp", "mx"], 5)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};
use uuid::Uuid;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmodial.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMODial configuration"));
}

const ENV_CONFIG_DIR: &str = "PMODIAL_CONFIG";
const ENV_PREFIX: &str = "PMODIAL_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmodial";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Configuration manager for PMODial
///
/// Holds the merged YAML tree and the file it is persisted to. All keys are
/// stored lower-cased, lookups are case-insensitive.
///
/// # Examples
///
/// ```no_run
/// use pmoconfig::Config;
///
/// let config = Config::load_config("/tmp/pmodial")?;
/// let mx = config.get_u64(&["ssdp", "mx"], 3);
/// println!("MX: {}", mx);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Creates the directory if needed and checks it is a writable directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMODIAL_CONFIG` environment variable
    /// 3. `.pmodial` in the current directory
    /// 4. `.pmodial` in the user's home directory
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// 1. Determines the configuration directory
    /// 2. Loads the embedded default configuration
    /// 3. Merges the external `config.yaml` over it, if present
    /// 4. Applies `PMODIAL_CONFIG__SECTION__KEY` environment overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path, "Loaded config file");
                // Keys are lowered before merging so `SSDP.MX` lands on `ssdp.mx`
                let external_value = Self::lower_keys_value(serde_yaml::from_slice(&data)?);
                merge_yaml(&mut config_value, &external_value);
            }
            Err(_) => {
                info!(config_file=%path, "Config file not found, using default embedded config");
            }
        }

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let data = self.lock()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// `path` is a list of keys, e.g. `&["ssdp", "mx"]`.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock()?;
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Fails if the path does not exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a map", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Reads a string, falling back to `default` when missing or empty
    pub fn get_string(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            Ok(Value::Null) | Err(_) => default.to_string(),
            Ok(Value::String(_)) => default.to_string(),
            Ok(other) => {
                warn!(path=%path.join("."), value=?other, "Expected a string, using default {}", default);
                default.to_string()
            }
        }
    }

    /// Reads an unsigned integer, accepting numeric strings
    pub fn get_u64(&self, path: &[&str], default: u64) -> u64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or(default),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                warn!(path=%path.join("."), "Invalid number '{}', using default {}", s, default);
                default
            }),
            Ok(Value::Null) | Err(_) => default,
            Ok(other) => {
                warn!(path=%path.join("."), value=?other, "Expected an unsigned integer, using default {}", default);
                default
            }
        }
    }

    pub fn set_u64(&self, path: &[&str], value: u64) -> Result<()> {
        self.set_value(path, Value::Number(Number::from(value)))
    }

    pub fn set_string(&self, path: &[&str], value: &str) -> Result<()> {
        self.set_value(path, Value::String(value.to_string()))
    }

    /// Gets a persistent UUID stored at `path`, generating one on first use
    ///
    /// A leading `uuid:` prefix is stripped so the stored value can be copied
    /// from an SSDP `USN` header.
    pub fn get_or_create_uuid(&self, path: &[&str]) -> Result<String> {
        match self.get_value(path) {
            Ok(Value::String(stored)) if !stored.trim().is_empty() => {
                let stored = stored.trim();
                Ok(stored.strip_prefix("uuid:").unwrap_or(stored).to_string())
            }
            _ => {
                let new_uuid = Uuid::new_v4().to_string();
                self.set_value(path, Value::String(new_uuid.clone()))?;
                Ok(new_uuid)
            }
        }
    }

    /// Minimum log level for the console subscriber (default `INFO`)
    pub fn get_log_min_level(&self) -> String {
        self.get_string(&["host", "logger", "min_level"], DEFAULT_LOG_MIN_LEVEL)
    }

    pub fn set_log_min_level(&self, level: &str) -> Result<()> {
        self.set_string(&["host", "logger", "min_level"], level)
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var=%key, "Ignoring environment override: {}", err);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(k, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }
}

/// Returns the global configuration instance, loaded on first access
///
/// # Panics
///
/// Panics on first access if no configuration directory can be created.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
