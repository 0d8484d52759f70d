//! Gateway configuration (SPEC_FULL.md §6.4, §10.3).
//!
//! Loaded once at startup from environment variables. Kept in
//! `aigateway-types` (rather than the `aigateway-infra` crate that parses
//! it) so both the core executor and the HTTP layer can depend on the
//! resulting value without depending on `clap`.

use secrecy::SecretString;

/// Resolved gateway configuration. Secrets are wrapped so they can't leak
/// through an accidental `Debug`/log of the surrounding struct.
#[derive(Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub api_key: Option<SecretString>,
    pub workflow_max_concurrent: usize,
    pub workflow_step_timeout_ms: u64,
    pub workflow_total_timeout_ms: u64,
    pub workflow_result_ttl_seconds: u64,
    pub kv_url: Option<String>,
    pub kv_token: Option<SecretString>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("workflow_max_concurrent", &self.workflow_max_concurrent)
            .field("workflow_step_timeout_ms", &self.workflow_step_timeout_ms)
            .field("workflow_total_timeout_ms", &self.workflow_total_timeout_ms)
            .field("workflow_result_ttl_seconds", &self.workflow_result_ttl_seconds)
            .field("kv_url", &self.kv_url)
            .field("kv_token", &self.kv_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            api_key: None,
            workflow_max_concurrent: 5,
            workflow_step_timeout_ms: 120_000,
            workflow_total_timeout_ms: 300_000,
            workflow_result_ttl_seconds: 604_800,
            kv_url: None,
            kv_token: None,
        }
    }
}

impl GatewayConfig {
    /// Whether bearer auth should be enforced. Per SPEC_FULL.md §6.4, an
    /// unset `API_KEY` disables auth entirely.
    pub fn auth_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether the external key-value backend should be used in place of
    /// the in-memory state manager.
    pub fn uses_external_kv(&self) -> bool {
        self.kv_url.is_some()
    }
}
