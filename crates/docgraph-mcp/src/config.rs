use std::path::{Path, PathBuf};

use docgraph_render::Locale;

use crate::error::AppError;

const LLM_PROVIDERS: &[&str] = &["deepseek", "ollama"];

/// Defaults applied to tool calls that leave a parameter unset.
#[derive(Debug, Clone)]
pub struct Config {
    pub tenant_id: String,
    pub llm_provider: String,
    pub llm_model: String,
    /// Language tag forwarded to the backend, e.g. `zh-Hant`.
    pub language: String,
    pub report_dir: String,
}

impl Config {
    /// Optional:
    /// - `DOCGRAPH_TENANT_ID` (default: "default")
    /// - `DOCGRAPH_LLM_PROVIDER` (default: "deepseek"; "deepseek" or "ollama")
    /// - `DOCGRAPH_LLM_MODEL` (default: "deepseek-chat")
    /// - `DOCGRAPH_LANGUAGE` (default: "zh-Hant")
    /// - `DOCGRAPH_REPORT_DIR` (default: "./reports")
    pub fn from_env() -> Result<Self, AppError> {
        Self::validated(Self {
            tenant_id: env_or("DOCGRAPH_TENANT_ID", "default"),
            llm_provider: env_or("DOCGRAPH_LLM_PROVIDER", "deepseek"),
            llm_model: env_or("DOCGRAPH_LLM_MODEL", "deepseek-chat"),
            language: env_or("DOCGRAPH_LANGUAGE", "zh-Hant"),
            report_dir: env_or("DOCGRAPH_REPORT_DIR", "./reports"),
        })
    }

    fn validated(config: Self) -> Result<Self, AppError> {
        if config.tenant_id.trim().is_empty() {
            return Err(AppError::Config("DOCGRAPH_TENANT_ID must not be empty".to_string()));
        }
        if !LLM_PROVIDERS.contains(&config.llm_provider.as_str()) {
            return Err(AppError::Config(format!(
                "unsupported DOCGRAPH_LLM_PROVIDER: '{}' (expected deepseek or ollama)",
                config.llm_provider
            )));
        }
        Ok(config)
    }

    pub fn locale(&self) -> Locale {
        Locale::parse(&self.language)
    }

    pub fn report_dir(&self) -> PathBuf {
        Path::new(&self.report_dir).to_path_buf()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
