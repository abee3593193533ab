use std::time::Duration;

use crate::AshareError;

/// LLM backends the core knows how to address via `ashare-llm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    Anthropic,
    Google,
    DashScope,
    Ollama,
    OpenRouter,
    DeepSeek,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "google" => Some(Self::Google),
            "dashscope" => Some(Self::DashScope),
            "ollama" => Some(Self::Ollama),
            "openrouter" => Some(Self::OpenRouter),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }
}

/// Run-wide configuration. Field set and defaults mirror the original
/// implementation's `DEFAULT_CONFIG` dict; `from_env` follows the
/// per-field `env::var(...).unwrap_or_else(...)` pattern used for client
/// configs elsewhere in the workspace.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub results_dir: String,
    pub data_dir: String,
    pub data_cache_dir: String,

    pub llm_provider: String,
    pub deep_think_llm: String,
    pub quick_think_llm: String,
    pub backend_url: String,

    pub max_debate_rounds: u32,
    pub max_risk_discuss_rounds: u32,
    pub max_recur_limit: u32,

    pub online_tools: bool,
    pub tushare_token: String,
    pub memory_db_path: String,

    pub tool_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            results_dir: "./results".to_string(),
            data_dir: "./data".to_string(),
            data_cache_dir: "./data/cache".to_string(),
            llm_provider: "openai".to_string(),
            deep_think_llm: "gpt-5".to_string(),
            quick_think_llm: "gpt-5-mini".to_string(),
            backend_url: "https://api.openai.com/v1".to_string(),
            max_debate_rounds: 1,
            max_risk_discuss_rounds: 1,
            max_recur_limit: 100,
            online_tools: true,
            tushare_token: String::new(),
            memory_db_path: "./data/memory.db".to_string(),
            tool_timeout: Duration::from_secs(60),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

impl RunConfig {
    /// Builds a config from env vars, falling back to `Default::default()`
    /// field by field, the way `ml-client::MLConfig::default()` does.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            results_dir: std::env::var("RESULTS_DIR").unwrap_or(base.results_dir),
            data_dir: std::env::var("ASHARE_DATA_DIR").unwrap_or(base.data_dir),
            data_cache_dir: std::env::var("ASHARE_DATA_CACHE_DIR").unwrap_or(base.data_cache_dir),
            llm_provider: std::env::var("LLM_PROVIDER").unwrap_or(base.llm_provider),
            deep_think_llm: std::env::var("DEEP_THINK_LLM").unwrap_or(base.deep_think_llm),
            quick_think_llm: std::env::var("QUICK_THINK_LLM").unwrap_or(base.quick_think_llm),
            backend_url: std::env::var("LLM_BACKEND_URL").unwrap_or(base.backend_url),
            max_debate_rounds: std::env::var("MAX_DEBATE_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.max_debate_rounds),
            max_risk_discuss_rounds: std::env::var("MAX_RISK_DISCUSS_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.max_risk_discuss_rounds),
            max_recur_limit: std::env::var("MAX_RECUR_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.max_recur_limit),
            online_tools: std::env::var("ONLINE_TOOLS")
                .ok()
                .map(|v| v != "0" && v.to_ascii_lowercase() != "false")
                .unwrap_or(base.online_tools),
            tushare_token: std::env::var("TUSHARE_TOKEN").unwrap_or(base.tushare_token),
            memory_db_path: std::env::var("MEMORY_DB_PATH").unwrap_or(base.memory_db_path),
            tool_timeout: base.tool_timeout,
            llm_timeout: base.llm_timeout,
        }
    }

    /// Range checks mirroring the original `validate_config`'s numeric bounds.
    pub fn validate(&self) -> Result<(), AshareError> {
        if !(1..=10).contains(&self.max_debate_rounds) {
            return Err(AshareError::Other(format!(
                "max_debate_rounds must be 1-10, got {}",
                self.max_debate_rounds
            )));
        }
        if !(1..=10).contains(&self.max_risk_discuss_rounds) {
            return Err(AshareError::Other(format!(
                "max_risk_discuss_rounds must be 1-10, got {}",
                self.max_risk_discuss_rounds
            )));
        }
        if LlmProviderKind::parse(&self.llm_provider).is_none() {
            return Err(AshareError::Other(format!(
                "unsupported llm_provider: {}",
                self.llm_provider
            )));
        }
        Ok(())
    }
}
