//! Infrastructure layer for the AI gateway.
//!
//! Implements the ports `aigateway-core` defines against real external
//! systems: `config` loads a `GatewayConfig` from the environment, `llm`
//! holds the provider adapters (`openai_compat` for text/vision,
//! `image_video_audio` for the remaining categories), and `kv` holds the
//! external key-value `StateManager` backend. Depends on `aigateway-types`
//! and `aigateway-core` but never the reverse.

pub mod config;
pub mod kv;
pub mod llm;
