use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inputs: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub ndvi: PathBuf,
    pub climate: PathBuf,
    pub parcels: PathBuf,
    #[serde(
        default = "default_failure_threshold",
        deserialize_with = "deserialize_ratio"
    )]
    pub failure_threshold: f64,
}

fn default_failure_threshold() -> f64 {
    0.10
}

/// Custom deserializer that handles a ratio as both number and string
///
/// Accepts:
/// - `failure_threshold: 0.1` (number)
/// - `failure_threshold: "0.1"` (string that parses to number)
/// - `failure_threshold: ${LOAD_FAILURE_THRESHOLD}` (env var substituted to either)
fn deserialize_ratio<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RatioValue {
        Number(f64),
        String(String),
    }

    match RatioValue::deserialize(deserializer)? {
        RatioValue::Number(n) => Ok(n),
        RatioValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid ratio: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub parcels: ParcelFilter,
}

/// Restricts the analysis to a subset of registered parcels.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ParcelFilter {
    #[serde(default)]
    pub ids: Vec<i64>,
    /// Glob patterns matched against parcel names
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ParcelFilter {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.patterns.is_empty()
    }

    /// A parcel passes if its id is listed or its name matches any pattern.
    pub fn matches(&self, parcel_id: i64, name: Option<&str>) -> bool {
        if self.is_empty() {
            return true;
        }

        if self.ids.contains(&parcel_id) {
            return true;
        }

        let Some(name) = name else {
            return false;
        };

        self.patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(name))
                .unwrap_or(false)
        })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        // Substitute environment variables
        let expanded = expand_env_vars(&content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables in paths
    /// - Non-empty input and output paths
    /// - A failure threshold within [0, 1]
    /// - Well-formed parcel name patterns
    fn validate(&self) -> Result<()> {
        let paths_to_check = [
            ("inputs.ndvi", &self.inputs.ndvi),
            ("inputs.climate", &self.inputs.climate),
            ("inputs.parcels", &self.inputs.parcels),
            ("output.dir", &self.output.dir),
        ];

        for (field_name, path) in &paths_to_check {
            let text = path.to_string_lossy();
            if text.contains("${") {
                return Err(AppError::Config(format!(
                    "{} contains an unexpanded environment variable: {}",
                    field_name, text
                )));
            }
            if text.trim().is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", field_name)));
            }
        }

        if !(0.0..=1.0).contains(&self.inputs.failure_threshold) {
            return Err(AppError::Config(format!(
                "inputs.failure_threshold must be between 0 and 1, got {}",
                self.inputs.failure_threshold
            )));
        }

        for pattern in &self.analysis.parcels.patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(AppError::Config(format!(
                    "Invalid parcel name pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        if self.inputs.ndvi == self.inputs.climate {
            tracing::warn!(
                "NDVI and climate inputs point at the same file: {}",
                self.inputs.ndvi.display()
            );
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid substitution pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root\n\
             2. Set the missing variable{}: export {}=<value>",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
        )));
    }

    Ok(result)
}
