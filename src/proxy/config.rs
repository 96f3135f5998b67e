use clap::Parser;

/// Schema-aware healing proxy for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone, Parser)]
#[command(name = "jsonheal-proxy", version, about)]
pub struct ProxyConfig {
    /// Port to listen on.
    #[arg(long, env = "JSONHEAL_PORT", default_value = "8321")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "JSONHEAL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Base URL of the upstream OpenAI-compatible API.
    #[arg(long, env = "JSONHEAL_UPSTREAM", default_value = "https://api.openai.com")]
    pub upstream: String,

    /// Bearer token forwarded to the upstream API.
    #[arg(long, env = "JSONHEAL_UPSTREAM_KEY")]
    pub upstream_key: Option<String>,

    /// Model substituted when a request omits `model`.
    #[arg(long, env = "JSONHEAL_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "JSONHEAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ProxyConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.upstream.starts_with("http://") && !self.upstream.starts_with("https://") {
            anyhow::bail!("--upstream must be an http(s) URL");
        }
        Ok(())
    }
}
