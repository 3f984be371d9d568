//! localrag-answer
//!
//! Turns a query plus its retrieved chunks into a grounded prompt and hands it
//! to a generative backend.

pub mod composer;
pub mod ollama;
pub mod prompt;

use std::sync::Arc;

use tracing::info;

use localrag_core::config::{GenerationBackend, GenerationSettings};
use localrag_core::error::Result;
use localrag_core::traits::Generator;

pub use composer::AnswerComposer;
pub use ollama::OllamaGenerator;
pub use prompt::{build_prompt, NO_CONTEXT_MARKER};

/// Build the generator selected by `generation.backend`.
pub fn generator_from_settings(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.backend {
        GenerationBackend::Ollama => {
            Arc::new(OllamaGenerator::new(&settings.base_url, &settings.model)?.with_temperature(settings.temperature))
        }
    };
    info!(generator = generator.id(), "generation backend ready");
    Ok(generator)
}
