//! Provider adapter implementations.
//!
//! - `openai_compat`: text/vision providers over any OpenAI-compatible API
//!   (OpenAI, Gemini, Mistral, GLM), implementing `aigateway_core`'s
//!   `ChatProvider` trait.
//! - `image_video_audio`: thin reqwest JSON adapters for the
//!   image/video/audio/embedding categories.

pub mod image_video_audio;
pub mod openai_compat;
