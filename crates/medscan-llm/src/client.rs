//! Vision model capability.
//!
//! The HTTP client that talks to the hosted model lives outside this
//! workspace. The pipeline only needs a single operation, `ask`, and a small
//! error vocabulary it can map into its own taxonomy.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

/// Failures reported by a model client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model client is not configured: {0}")]
    Configuration(String),

    #[error("model credentials rejected: {0}")]
    Authentication(String),

    #[error("model rate limit reached: {0}")]
    RateLimited(String),

    #[error("model request failed: {0}")]
    Api(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// A normalized image ready to be sent to the model.
#[derive(Debug, Clone, Copy)]
pub struct ModelImage<'a> {
    /// Location of the encoded image on disk
    pub path: &'a Path,
    /// MIME type of the encoded image (e.g. "image/jpeg")
    pub content_type: &'a str,
    pub width: u32,
    pub height: u32,
}

/// Anything that can answer a prompt about an image.
///
/// Implementations block until the model answers.
pub trait ModelClient: Send + Sync {
    fn ask(&self, image: &ModelImage<'_>, prompt: &str) -> ModelResult<String>;
}

/// Model client that replays canned responses in order.
///
/// Used in tests and demos in place of the network client. Once the script
/// runs out, the fallback response (if any) is returned for every call.
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<ModelResult<String>>>,
    fallback: Option<ModelResult<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModelClient {
    /// Replay `responses` once each, then fail with an API error.
    pub fn new(responses: Vec<ModelResult<String>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response.
    pub fn always(response: ModelResult<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same text.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::always(Ok(text.into()))
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ModelClient for ScriptedModelClient {
    fn ask(&self, _image: &ModelImage<'_>, prompt: &str) -> ModelResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(ModelError::Api("no scripted response left".into()))),
        }
    }
}
