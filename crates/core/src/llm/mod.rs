pub mod error;
pub mod gemini;
pub mod json;
pub mod prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

/// A single-prompt text completion backend.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}
