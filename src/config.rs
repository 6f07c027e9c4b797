//! Service configuration, read once from the environment at startup

use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_THINKING_BUDGET: u32 = 2048;
const DEFAULT_MAX_ROUNDS: u32 = 10;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FPL_BASE_URL: &str = "https://fantasy.premierleague.com/api";

/// Configuration for the generation provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Server-side credential, used when the request carries none
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Token budget for extended reasoning when the client asks for it
    pub thinking_budget: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }
}

impl LlmConfig {
    /// Pick the credential for one request: a non-blank request key wins
    /// over the configured one.
    pub fn resolve_api_key(&self, request_key: Option<&str>) -> Option<String> {
        request_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
            })
            .map(ToString::to_string)
    }
}

/// Bounds on a single chat exchange
#[derive(Debug, Clone, Copy)]
pub struct ChatLimits {
    /// Maximum number of generation calls per request
    pub max_rounds: u32,
    /// Upper bound on one tool invocation
    pub tool_timeout: Duration,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub limits: ChatLimits,
    pub fpl_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            llm: LlmConfig::default(),
            limits: ChatLimits::default(),
            fpl_base_url: DEFAULT_FPL_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let tool_timeout_secs = parse_or(
            &lookup,
            "FPL_CHAT_TOOL_TIMEOUT_SECS",
            DEFAULT_TOOL_TIMEOUT_SECS,
        );

        Self {
            port: parse_or(&lookup, "FPL_CHAT_PORT", defaults.port),
            llm: LlmConfig {
                api_key: lookup("ANTHROPIC_API_KEY"),
                base_url: lookup("ANTHROPIC_BASE_URL").unwrap_or(defaults.llm.base_url),
                model: lookup("FPL_CHAT_MODEL").unwrap_or(defaults.llm.model),
                max_tokens: parse_or(&lookup, "FPL_CHAT_MAX_TOKENS", defaults.llm.max_tokens),
                thinking_budget: parse_or(
                    &lookup,
                    "FPL_CHAT_THINKING_BUDGET",
                    defaults.llm.thinking_budget,
                ),
            },
            limits: ChatLimits {
                max_rounds: parse_or(&lookup, "FPL_CHAT_MAX_ROUNDS", defaults.limits.max_rounds)
                    .max(1),
                tool_timeout: Duration::from_secs(tool_timeout_secs.max(1)),
            },
            fpl_base_url: lookup("FPL_API_BASE_URL").unwrap_or(defaults.fpl_base_url),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}
