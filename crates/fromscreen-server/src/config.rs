//! Process configuration from flags and environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::image::DEFAULT_MAX_IMAGE_BYTES;
use crate::upstream::openrouter::{OpenRouterConfig, DEFAULT_BASE_URL};
use crate::upstream::resolve_model;

/// fromscreen - screenshot to markup conversion server
#[derive(Debug, Clone, Parser)]
#[command(name = "fromscreen-server")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// PostgreSQL connection string. Without it, state is kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: String,

    /// Model id; blank means the default model
    #[arg(long, env = "OPENROUTER_MODEL")]
    pub openrouter_model: Option<String>,

    /// OpenRouter API root
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openrouter_base_url: String,

    /// Public site URL, sent upstream as the referer
    #[arg(long, env = "SITE_URL", default_value = "http://localhost:3000")]
    pub site_url: String,

    /// Seconds to wait for the next upstream chunk before failing
    #[arg(long, env = "UPSTREAM_IDLE_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_idle_timeout_secs: u64,

    /// Seconds to wait for the upstream connection
    #[arg(long, env = "UPSTREAM_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_connect_timeout_secs: u64,

    /// Mark the session cookie `Secure`
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Largest accepted decoded screenshot, in bytes
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,
}

impl Config {
    /// Model id after applying the default.
    pub fn model(&self) -> String {
        resolve_model(self.openrouter_model.as_deref())
    }

    pub fn openrouter(&self) -> OpenRouterConfig {
        OpenRouterConfig {
            api_key: self.openrouter_api_key.clone(),
            base_url: self.openrouter_base_url.clone(),
            site_url: self.site_url.clone(),
            connect_timeout: Duration::from_secs(self.upstream_connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.upstream_idle_timeout_secs),
        }
    }
}
