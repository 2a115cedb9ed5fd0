//! Scripted text generator for tests and offline runs
//!
//! Answers come from prompt rules first (first rule whose needle appears in
//! the user prompt), then from a FIFO queue. With neither, the call fails with
//! a transport error. Every request is recorded for assertions.

use super::{CompletionRequest, ServiceError, TextGenerator};
use crate::credential::Credential;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

type Reply = Result<String, ServiceError>;

#[derive(Default)]
struct Script {
    rules: Vec<(String, Reply)>,
    queue: VecDeque<Reply>,
    calls: Vec<CompletionRequest>,
}

/// Cloning shares the script and the call log
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a successful answer
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.lock().queue.push_back(Ok(text.into()));
        self
    }

    /// Queue a failure
    pub fn fail(self, error: ServiceError) -> Self {
        self.lock().queue.push_back(Err(error));
        self
    }

    /// Answer every request whose user prompt contains `needle`
    pub fn on_prompt(self, needle: impl Into<String>, reply: Reply) -> Self {
        self.lock().rules.push((needle.into(), reply));
        self
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete(&self, _api_key: &Credential, request: &CompletionRequest) -> Result<String, ServiceError> {
        let mut script = self.lock();
        script.calls.push(request.clone());

        if let Some((_, reply)) = script
            .rules
            .iter()
            .find(|(needle, _)| request.user_prompt.contains(needle.as_str()))
        {
            return reply.clone();
        }

        script
            .queue
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("No scripted response left".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_before_queue() {
        let generator = ScriptedGenerator::new()
            .respond("queued")
            .on_prompt("priorite", Ok("Urgent".to_string()));
        let key = Credential::new("k");

        let a = generator.complete(&key, &CompletionRequest::new("field priorite"));
        let b = generator.complete(&key, &CompletionRequest::new("field montant"));
        let c = generator.complete(&key, &CompletionRequest::new("field montant"));

        assert_eq!(a.unwrap(), "Urgent");
        assert_eq!(b.unwrap(), "queued");
        assert!(matches!(c, Err(ServiceError::Transport(_))));
        assert_eq!(generator.call_count(), 3);
    }
}
