use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::base::{CompletionOptions, Provider, ProviderKind, Usage};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// What one call to the mock saw.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub options: CompletionOptions,
}

/// A provider that plays back canned outcomes in order and records every
/// request so tests can assert on what was sent. Once the outcomes run
/// out it answers with an empty assistant message.
#[derive(Clone)]
pub struct MockProvider {
    outcomes: Arc<Mutex<Vec<Result<(Message, Usage), ProviderError>>>>,
    requests: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    pub fn new(messages: Vec<Message>) -> Self {
        Self::with_outcomes(
            messages
                .into_iter()
                .map(|message| Ok((message, Usage::default())))
                .collect(),
        )
    }

    pub fn with_outcomes(outcomes: Vec<Result<(Message, Usage), ProviderError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<RecordedCall> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        self.requests.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            options: options.clone(),
        });

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            outcomes.remove(0)
        }
    }
}
