//! LLM provider implementations.

pub mod factory;
pub mod openai_compat;

pub use factory::CatalogBackendFactory;
pub use openai_compat::OpenAiCompatBackend;
