use crate::error::{AnalyzerError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Main configuration struct for the application
///
/// Holds archive limits, the LLM model selection, server binding, and
/// path-exclusion patterns. Values come from built-in defaults, an optional
/// TOML file, and environment variable overrides, in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Foundation-model id with a backend prefix, e.g. `openai/gpt-4o-mini`,
    /// `watsonx/meta-llama/llama-4-maverick`, or `ollama/llama3`
    pub model: String,
    /// Hard upper limit on the *compressed* archive size, in megabytes
    pub zip_size_limit_mb: u64,
    /// Max *uncompressed* size allowed for a single archive member, in megabytes
    pub max_member_size_mb: u64,
    /// Delete the extracted working directory after the pipeline finishes
    pub delete_temp_after_run: bool,
    /// Run the LLM polish pass on the synthesized overview
    pub polish: bool,
    /// HTTP server bind host
    pub host: String,
    /// HTTP server bind port
    pub port: u16,
    /// Base URL of a local Ollama server
    pub ollama_url: String,
    /// Base URL of the watsonx.ai inference endpoint
    pub watsonx_url: String,
    /// Regex patterns for paths that triage never analyses
    pub ignored_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            zip_size_limit_mb: 300,
            max_member_size_mb: 150,
            delete_temp_after_run: true,
            polish: true,
            host: "0.0.0.0".to_string(),
            port: 8000,
            ollama_url: "http://localhost:11434".to_string(),
            watsonx_url: "https://us-south.ml.cloud.ibm.com".to_string(),
            ignored_paths: vec![
                r"\.git/".to_string(),
                r"node_modules/".to_string(),
                r"__pycache__/".to_string(),
                r"target/".to_string(),
                r"\.venv/".to_string(),
                r"\.env$".to_string(),
            ],
        }
    }
}

impl Config {
    /// Loads configuration from the default config file location
    ///
    /// If the config file doesn't exist, starts from the default
    /// configuration. Environment variables are applied on top either way.
    pub fn load() -> Result<Self> {
        let mut config = match dirs::config_dir()
            .map(|d| d.join("project-analyzer").join("config.toml"))
            .filter(|p| p.exists())
        {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    AnalyzerError::Config(format!("failed to read config file: {e}"))
                })?;
                toml::from_str(&content).map_err(|e| {
                    AnalyzerError::Config(format!("failed to parse config file: {e}"))
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Applies environment variable overrides onto this configuration
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("ANALYZER_MODEL") {
            self.model = v;
        }
        if let Ok(v) = env::var("ZIP_SIZE_LIMIT_MB") {
            if let Ok(n) = v.parse() {
                self.zip_size_limit_mb = n;
            }
        }
        if let Ok(v) = env::var("MAX_MEMBER_SIZE_MB") {
            if let Ok(n) = v.parse() {
                self.max_member_size_mb = n;
            }
        }
        if let Ok(v) = env::var("DELETE_TEMP_AFTER_RUN") {
            self.delete_temp_after_run = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("APP_HOST") {
            self.host = v;
        }
        if let Ok(v) = env::var("APP_PORT") {
            if let Ok(n) = v.parse() {
                self.port = n;
            }
        }
        if let Ok(v) = env::var("OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Ok(v) = env::var("WATSONX_URL") {
            self.watsonx_url = v;
        }
    }

    /// Archive size ceiling in bytes
    pub fn zip_size_limit_bytes(&self) -> u64 {
        self.zip_size_limit_mb * 1_048_576
    }

    /// Per-member uncompressed size ceiling in bytes
    pub fn max_member_size_bytes(&self) -> u64 {
        self.max_member_size_mb * 1_048_576
    }

    /// Checks if a path matches one of the configured exclusion patterns
    pub fn is_ignored_path(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.ignored_paths.iter().any(|pattern| {
            if let Ok(regex) = Regex::new(pattern) {
                regex.is_match(&path_str)
            } else {
                false
            }
        })
    }
}
