//! Process configuration loaded from environment variables.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Startup settings. Defaults reproduce the stock single-model setup.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    /// Listen address, e.g. `0.0.0.0:8000`.
    pub address: String,
    /// Reader models; one finder is built per entry.
    pub model_paths: Vec<String>,
    pub use_gpu: bool,
    pub batch_size: usize,
    /// Document store connection string, e.g. `sqlite:///qa.db`.
    pub database_url: String,
    /// Directory of `*.txt` files written to the store at startup.
    pub documents_dir: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".into(),
            model_paths: vec!["deepset/bert-base-cased-squad2".into()],
            use_gpu: false,
            batch_size: 16,
            database_url: "sqlite:///qa.db".into(),
            documents_dir: None,
        }
    }
}

impl ApiConfig {
    /// Build from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let dflt = Self::default();

        let model_paths = match get("MODEL_PATHS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => dflt.model_paths,
        };

        let batch_size = parse(&get, "BATCH_SIZE", dflt.batch_size)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "BATCH_SIZE",
                value: "0".into(),
            });
        }

        Ok(Self {
            address: get("API_ADDRESS").unwrap_or(dflt.address),
            model_paths,
            use_gpu: parse_bool(&get, "USE_GPU", dflt.use_gpu)?,
            batch_size,
            database_url: get("DATABASE_URL").unwrap_or(dflt.database_url),
            documents_dir: get("DOCUMENTS_DIR").filter(|s| !s.trim().is_empty()),
        })
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    dflt: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(dflt),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    dflt: bool,
) -> Result<bool, ConfigError> {
    match get(key) {
        None => Ok(dflt),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: v }),
        },
    }
}
