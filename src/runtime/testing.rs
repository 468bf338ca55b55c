//! Recording runtime for tests.

use std::any::Any;
use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ConfirmResult, RuntimeError, RuntimeEvent, TrackerRuntime};

/// Collects emitted events and answers confirmations from a script.
#[derive(Default)]
pub struct RecordingRuntime {
    events: Mutex<Vec<RuntimeEvent>>,
    answers: Mutex<VecDeque<ConfirmResult>>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next confirmation request.
    pub fn answer_next(&self, answer: ConfirmResult) {
        self.answers.lock().push_back(answer);
    }

    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RuntimeEvent::Notice { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TrackerRuntime for RecordingRuntime {
    fn emit(&self, event: RuntimeEvent) -> Result<(), RuntimeError> {
        self.events.lock().push(event);
        Ok(())
    }

    async fn request_confirmation(&self, prompt: String) -> Result<ConfirmResult, RuntimeError> {
        self.prompts.lock().push(prompt);
        self.answers
            .lock()
            .pop_front()
            .ok_or(RuntimeError::NotInteractive)
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn auto_confirm(&self) -> bool {
        false
    }

    async fn shutdown(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
