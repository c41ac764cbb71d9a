//! Preview configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Invalid config '{path}': {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    /// Wall-clock budget shared by executing a module and probing all of its
    /// candidate components.
    pub synthesis_budget_ms: u64,
    /// Wall-clock budget for a single render pass.
    pub render_budget_ms: u64,
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub max_collection_len: usize,
    pub max_string_len: usize,
    /// Largest sanitized source accepted for parsing.
    pub max_source_kib: usize,
    /// Syntactic nesting (expressions, statements, patterns) accepted from
    /// generated code.
    pub max_nesting_depth: usize,
    /// Native stack the interpreter and renderer may use below their entry
    /// point.
    pub max_stack_kib: usize,
    /// Consecutive renders triggered by state updates before giving up.
    pub max_render_passes: usize,
    /// Characters of sanitized source kept in diagnostics.
    pub preview_chars: usize,
    pub generation: GenerationConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            synthesis_budget_ms: 250,
            render_budget_ms: 250,
            max_steps: 2_000_000,
            max_call_depth: 200,
            max_collection_len: 100_000,
            max_string_len: 1 << 20,
            max_source_kib: 64,
            max_nesting_depth: 128,
            max_stack_kib: 1024,
            max_render_passes: 25,
            preview_chars: 200,
            generation: GenerationConfig::default(),
        }
    }
}

impl PreviewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&data).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| e.to_string())
    }

    pub fn synthesis_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            budget: Duration::from_millis(self.synthesis_budget_ms),
            ..self.base_limits()
        }
    }

    pub fn render_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            budget: Duration::from_millis(self.render_budget_ms),
            ..self.base_limits()
        }
    }

    fn base_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            budget: Duration::from_millis(self.synthesis_budget_ms),
            max_steps: self.max_steps,
            max_call_depth: self.max_call_depth,
            max_collection_len: self.max_collection_len,
            max_string_len: self.max_string_len,
            max_source_len: self.max_source_kib * 1024,
            max_nesting_depth: self.max_nesting_depth,
            max_stack_bytes: self.max_stack_kib * 1024,
        }
    }
}

/// Resource caps applied to one interpreter run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionLimits {
    pub budget: Duration,
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub max_collection_len: usize,
    pub max_string_len: usize,
    pub max_source_len: usize,
    pub max_nesting_depth: usize,
    pub max_stack_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        PreviewConfig::default().synthesis_limits()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_tokens: 3000,
            temperature: 0.3,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
