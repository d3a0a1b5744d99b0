//! Scripted provider for tests.
//!
//! Replies are consumed in order; once the script runs out the fallback
//! reply is used. Every prompt received is recorded for inspection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::insight::prompt::Prompt;
use crate::insight::provider::InsightProvider;

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedProvider {
    /// Always answers with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with an external-service error.
    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue one reply ahead of the fallback.
    pub fn then(self, reply: Result<String>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl InsightProvider for ScriptedProvider {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }

        self.fallback
            .clone()
            .ok_or_else(|| Error::ExternalService("scripted failure".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// A well-formed insight reply.
pub fn well_formed_reply() -> String {
    include_str!("../../fixtures/insight/well_formed.json").to_string()
}
