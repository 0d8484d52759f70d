//! Environment-variable configuration loader (SPEC_FULL.md §6.4, §10.3).
//!
//! Parses the gateway's env vars into [`GatewayConfig`] via `clap`'s
//! derive + `env` feature, the same mechanism the teacher's CLI uses for
//! its own flags -- here there are no positional args or subcommands, only
//! environment-sourced fields, so `parse()` is called against `&[]` rather
//! than `std::env::args()`.

use aigateway_types::config::GatewayConfig;
use clap::Parser;
use secrecy::SecretString;

#[derive(Parser, Debug)]
#[command(name = "aigateway", about = "AI gateway server configuration")]
struct EnvArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    #[arg(long, env = "WORKFLOW_MAX_CONCURRENT", default_value_t = 5)]
    workflow_max_concurrent: usize,

    #[arg(long, env = "WORKFLOW_STEP_TIMEOUT_MS", default_value_t = 120_000)]
    workflow_step_timeout_ms: u64,

    #[arg(long, env = "WORKFLOW_TOTAL_TIMEOUT_MS", default_value_t = 300_000)]
    workflow_total_timeout_ms: u64,

    #[arg(long, env = "WORKFLOW_RESULT_TTL_SECONDS", default_value_t = 604_800)]
    workflow_result_ttl_seconds: u64,

    #[arg(long, env = "GATEWAY_KV_URL")]
    gateway_kv_url: Option<String>,

    #[arg(long, env = "GATEWAY_KV_TOKEN")]
    gateway_kv_token: Option<String>,
}

/// Load [`GatewayConfig`] from the process environment. Unset variables
/// fall back to the defaults in [`GatewayConfig::default`]; this loader
/// exists only to source those same defaults from `std::env` when
/// present, and to wrap secrets before they ever touch a log line.
pub fn load_from_env() -> GatewayConfig {
    let args = EnvArgs::parse_from(std::iter::once("aigateway".to_string()));

    if args.gateway_kv_token.is_some() && args.gateway_kv_url.is_none() {
        tracing::warn!("GATEWAY_KV_TOKEN is set without GATEWAY_KV_URL; the token will be ignored");
    }

    GatewayConfig {
        port: args.port,
        api_key: args.api_key.map(SecretString::from),
        workflow_max_concurrent: args.workflow_max_concurrent,
        workflow_step_timeout_ms: args.workflow_step_timeout_ms,
        workflow_total_timeout_ms: args.workflow_total_timeout_ms,
        workflow_result_ttl_seconds: args.workflow_result_ttl_seconds,
        kv_url: args.gateway_kv_url,
        kv_token: args.gateway_kv_token.map(SecretString::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "PORT",
            "API_KEY",
            "WORKFLOW_MAX_CONCURRENT",
            "WORKFLOW_STEP_TIMEOUT_MS",
            "WORKFLOW_TOTAL_TIMEOUT_MS",
            "WORKFLOW_RESULT_TTL_SECONDS",
            "GATEWAY_KV_URL",
            "GATEWAY_KV_TOKEN",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn missing_env_vars_fall_back_to_spec_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let config = load_from_env();
        assert_eq!(config.port, 3000);
        assert_eq!(config.workflow_max_concurrent, 5);
        assert_eq!(config.workflow_step_timeout_ms, 120_000);
        assert_eq!(config.workflow_total_timeout_ms, 300_000);
        assert_eq!(config.workflow_result_ttl_seconds, 604_800);
        assert!(!config.auth_enabled());
        assert!(!config.uses_external_kv());
    }

    #[test]
    fn api_key_env_var_enables_auth() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("API_KEY", "secret-key") };
        let config = load_from_env();
        assert!(config.auth_enabled());
        clear_env();
    }

    #[test]
    fn kv_url_env_var_selects_external_backend() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("GATEWAY_KV_URL", "https://kv.example.com") };
        let config = load_from_env();
        assert!(config.uses_external_kv());
        clear_env();
    }

    #[test]
    fn custom_port_and_concurrency_are_parsed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            std::env::set_var("PORT", "8080");
            std::env::set_var("WORKFLOW_MAX_CONCURRENT", "20");
        }
        let config = load_from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.workflow_max_concurrent, 20);
        clear_env();
    }
}
