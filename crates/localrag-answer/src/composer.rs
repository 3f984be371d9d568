use std::sync::Arc;

use tracing::debug;

use localrag_core::error::Result;
use localrag_core::traits::Generator;
use localrag_core::types::RetrievalResult;

use crate::prompt::build_prompt;

/// Builds grounded prompts and forwards them to a generator. Holds no index
/// state; a failed `answer` is returned as-is without retrying.
#[derive(Clone)]
pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>) -> Self { Self { generator } }

    pub fn generator_id(&self) -> &str { self.generator.id() }

    pub fn compose(&self, query: &str, retrieval: &RetrievalResult) -> String { build_prompt(query, retrieval) }

    pub async fn answer(&self, prompt: &str) -> Result<String> {
        debug!(generator = self.generator.id(), prompt_chars = prompt.len(), "generating answer");
        let text = self.generator.generate(prompt).await?;
        Ok(text.trim().to_string())
    }
}
