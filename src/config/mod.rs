//! Configuration model for promptforge.
//!
//! A `Config` is read from an optional YAML file (unknown fields ignored,
//! every field defaulted) and merged with the process environment exactly
//! once at startup via [`Config::resolve_llm`]. Nothing below `main` reads
//! the environment.

mod model;
mod operations;


pub use model::{Config, GenerationSection, LlmConfig, LlmSettings, TestingSection};
pub use operations::{
    ENV_ANTHROPIC_API_KEY, ENV_ANTHROPIC_BASE_URL, ENV_MODEL_NAME, ENV_OPENAI_API_KEY,
    ENV_OPENAI_BASE_URL, ENV_PROVIDER,
};
