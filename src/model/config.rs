use serde::Deserialize;
use std::fs;
use std::path::Path;

const ENV_CONFIG_PATH: &str = "INTAKE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// How the schema registry resolves tickets of one type that disagree on
/// their mandatory-field list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Field list of the first ticket of the type in corpus order
    FirstSeen,
    /// Most frequent field list; ties go to the earliest-seen list
    #[default]
    MostCommon,
    /// Every field any ticket of the type requires, in first-seen order
    Union,
}

/// Decision pipeline tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Neighbors retrieved per turn and handed to the decision engine
    pub neighbor_count: usize,
    /// Neighbors used as few-shot examples for classification
    pub classifier_examples: usize,
    pub schema_policy: SchemaPolicy,
    /// Expected embedding length. Inferred from the corpus when unset.
    pub embedding_dimension: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            neighbor_count: 5,
            classifier_examples: 3,
            schema_policy: SchemaPolicy::default(),
            embedding_dimension: None,
        }
    }
}

/// Risk posture report settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskPostureConfig {
    pub window_days: i64,
    pub top_n: usize,
}

impl Default for RiskPostureConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            top_n: 5,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub risk_posture: RiskPostureConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub risk_posture: RiskPostureConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            risk_posture: RiskPostureConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        Self {
            pipeline: file.pipeline,
            risk_posture: file.risk_posture,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(&contents, path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_config(contents: &str, path: &Path) -> Option<ConfigFile> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Some(ConfigFile::default());
        }

        match serde_yaml::from_str(contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let yaml = "pipeline:\n  schema_policy: union\n  neighbor_count: 7\n";
        let file = Config::parse_config(yaml, Path::new("config.yaml")).unwrap();

        assert_eq!(file.pipeline.schema_policy, SchemaPolicy::Union);
        assert_eq!(file.pipeline.neighbor_count, 7);
        assert_eq!(file.pipeline.classifier_examples, 3);
        assert_eq!(file.risk_posture.window_days, 30);
    }

    #[test]
    fn test_parse_empty_config_is_default() {
        let file = Config::parse_config("   \n", Path::new("config.yaml")).unwrap();
        assert_eq!(file.pipeline.schema_policy, SchemaPolicy::MostCommon);
        assert_eq!(file.risk_posture.top_n, 5);
    }

    #[test]
    fn test_parse_invalid_config_is_none() {
        let parsed = Config::parse_config(
            "pipeline:\n  schema_policy: newest\n",
            Path::new("config.yaml"),
        );
        assert!(parsed.is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(Config::load_config_file("/nonexistent/intake-config.yaml").is_none());
    }
}
