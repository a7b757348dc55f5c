//! Compat-side environment knobs.

use std::time::Duration;

/// Default model id when neither the request nor the template names one.
pub const DEFAULT_BASE_MODEL: &str = "claude-4.1-opus";

/// Model id echoed in responses when the request named none.
pub const FALLBACK_MODEL_ID: &str = "warp-default";

/// Schema type sent with every bridge packet.
pub const REQUEST_MESSAGE_TYPE: &str = "warp.multi_agent.v1.Request";

#[derive(Clone, Debug)]
pub struct CompatSettings {
    /// Bridge server base URL.
    pub bridge_base_url: String,
    /// Health-poll attempts before warmup.
    pub init_retries: u32,
    /// Delay between health-poll attempts.
    pub init_delay: Duration,
    /// Warmup request attempts.
    pub warmup_retries: u32,
    /// Delay between warmup attempts.
    pub warmup_delay: Duration,
}

impl CompatSettings {
    pub fn from_env() -> Self {
        Self {
            bridge_base_url: std::env::var("WARP_BRIDGE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            init_retries: warp_config::env_parse("WARP_COMPAT_INIT_RETRIES", 10u32),
            init_delay: Duration::from_secs_f64(warp_config::env_parse(
                "WARP_COMPAT_INIT_DELAY",
                0.5f64,
            )),
            warmup_retries: warp_config::env_parse("WARP_COMPAT_WARMUP_RETRIES", 3u32),
            warmup_delay: Duration::from_secs_f64(warp_config::env_parse(
                "WARP_COMPAT_WARMUP_DELAY",
                1.5f64,
            )),
        }
    }
}
