//! Link prompt
//!
//! Asking the user for a URL is a request/response step. Cancelling and
//! submitting an empty value are different answers.

use std::collections::VecDeque;
use std::future::Future;

use parking_lot::Mutex;

pub const LINK_PROMPT_MESSAGE: &str = "Enter URL (leave empty to remove):";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    /// The prompt was dismissed
    Cancelled,
    /// The user confirmed, possibly with an empty value
    Submitted(String),
}

pub trait LinkPrompt: Send + Sync {
    /// Ask the user, pre-filling `default`
    fn request(&self, message: &str, default: &str) -> impl Future<Output = PromptResponse> + Send;
}

/// Answers prompts from a queue; an exhausted queue cancels
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    responses: Mutex<VecDeque<PromptResponse>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedPrompt {
    pub fn new(responses: impl IntoIterator<Item = PromptResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn submitting(value: impl Into<String>) -> Self {
        Self::new([PromptResponse::Submitted(value.into())])
    }

    pub fn cancelling() -> Self {
        Self::new([PromptResponse::Cancelled])
    }

    /// `(message, default)` of every request so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

impl LinkPrompt for ScriptedPrompt {
    async fn request(&self, message: &str, default: &str) -> PromptResponse {
        self.requests
            .lock()
            .push((message.to_string(), default.to_string()));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or(PromptResponse::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_prompt_answers_in_order() {
        let prompt = ScriptedPrompt::new([
            PromptResponse::Submitted("".into()),
            PromptResponse::Submitted("x".into()),
        ]);

        assert_eq!(prompt.request("m", "d").await, PromptResponse::Submitted("".into()));
        assert_eq!(prompt.request("m", "").await, PromptResponse::Submitted("x".into()));
        assert_eq!(prompt.request("m", "").await, PromptResponse::Cancelled);
        assert_eq!(prompt.requests()[0], ("m".to_string(), "d".to_string()));
    }
}
