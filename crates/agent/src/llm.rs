use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("provider returned no content")]
    EmptyResponse,
    #[error("scripted generator has no responses left")]
    Exhausted,
}

/// Opaque prompt-in/text-out capability. Blocking by contract.
pub trait TextGenerator {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError>;
}

impl<G: TextGenerator + ?Sized> TextGenerator for &G {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt, model_id)
    }
}

impl<G: TextGenerator + ?Sized> TextGenerator for Arc<G> {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt, model_id)
    }
}

impl<G: TextGenerator + ?Sized> TextGenerator for Box<G> {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt, model_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPrompt {
    pub model_id: String,
    pub prompt: String,
}

/// Replays canned responses in order and records every prompt it was given.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl ScriptedGenerator {
    pub fn new<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        match self.responses.lock() {
            Ok(mut responses) => responses.push_back(response.into()),
            Err(poisoned) => poisoned.into_inner().push_back(response.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        match self.responses.lock() {
            Ok(responses) => responses.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        match self.prompts.lock() {
            Ok(prompts) => prompts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError> {
        let recorded = RecordedPrompt { model_id: model_id.to_string(), prompt: prompt.to_string() };
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(recorded),
            Err(poisoned) => poisoned.into_inner().push(recorded),
        }

        let next = match self.responses.lock() {
            Ok(mut responses) => responses.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.ok_or(GenerationError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{GenerationError, ScriptedGenerator, TextGenerator};

    #[test]
    fn scripted_generator_replays_in_order_and_records_prompts() {
        let generator = ScriptedGenerator::new(["<s>hello</s>", "<answer>no</answer>"]);

        assert_eq!(generator.generate("first", "chat").as_deref(), Ok("<s>hello</s>"));
        assert_eq!(generator.generate("second", "summarizer").as_deref(), Ok("<answer>no</answer>"));
        assert_eq!(generator.generate("third", "chat"), Err(GenerationError::Exhausted));

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[1].model_id, "summarizer");
        assert_eq!(prompts[2].prompt, "third");
    }

    #[test]
    fn shared_generator_is_still_a_generator() {
        let generator = Arc::new(ScriptedGenerator::default());
        generator.push("<s>hi</s>");

        assert_eq!(generator.remaining(), 1);
        assert_eq!(Arc::clone(&generator).generate("p", "m").as_deref(), Ok("<s>hi</s>"));
        assert_eq!(generator.remaining(), 0);
    }
}
