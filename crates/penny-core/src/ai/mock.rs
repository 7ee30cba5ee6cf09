//! Mock gateway for testing
//!
//! Replies are scripted per call, with a fallback once the script runs out.
//! The default fallback produces canned answers from the prompt so the CLI and
//! server can be exercised without a running model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{finish_completion, GatewayError, GenerationRequest, ModelGateway};

/// Most recent prompts kept by `MockGateway::prompts`
pub const MAX_CAPTURED_PROMPTS: usize = 100;

/// One scripted gateway response
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    /// Return this completion text (trimmed like a real backend)
    Reply(String),
    /// Fail with this error
    Fail(GatewayError),
    /// Answer from the prompt contents
    Canned,
}

/// Mock model gateway
#[derive(Clone)]
pub struct MockGateway {
    script: Arc<Mutex<VecDeque<MockStep>>>,
    fallback: MockStep,
    delay: Duration,
    healthy: bool,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<VecDeque<String>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Canned answers for every call
    pub fn new() -> Self {
        Self::with_script(Vec::new(), MockStep::Canned)
    }

    /// Always reply with `text`
    pub fn replying(text: &str) -> Self {
        Self::with_script(Vec::new(), MockStep::Reply(text.to_string()))
    }

    /// Always fail with `error`
    pub fn failing(error: GatewayError) -> Self {
        Self::with_script(Vec::new(), MockStep::Fail(error))
    }

    /// Play `steps` in order, then `fallback` for every later call
    pub fn with_script(steps: Vec<MockStep>, fallback: MockStep) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            fallback,
            delay: Duration::ZERO,
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Wait this long before answering; a delay past the request timeout
    /// yields `GatewayError::Timeout`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Number of `invoke` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order (the last `MAX_CAPTURED_PROMPTS` only)
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn capture_prompt(&self, prompt: &str) {
        let mut prompts = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
        if prompts.len() == MAX_CAPTURED_PROMPTS {
            prompts.pop_front();
        }
        prompts.push_back(prompt.to_string());
    }

    fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.capture_prompt(&request.prompt);
        let step = self.next_step();

        if !self.delay.is_zero() {
            if self.delay > request.timeout {
                tokio::time::sleep(request.timeout).await;
                return Err(GatewayError::Timeout(request.timeout));
            }
            tokio::time::sleep(self.delay).await;
        }

        match step {
            MockStep::Reply(text) => finish_completion(&text),
            MockStep::Fail(error) => Err(error),
            MockStep::Canned => finish_completion(&canned_reply(&request.prompt)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// Keyword-based answers for offline development
fn canned_reply(prompt: &str) -> String {
    if let Some(line) = prompt.lines().find(|l| l.starts_with("Description:")) {
        let description = line.trim_start_matches("Description:").trim().to_uppercase();
        let category = match description.as_str() {
            d if d.contains("UBER") || d.contains("LYFT") || d.contains("SHELL") => {
                "Transportation"
            }
            d if d.contains("NETFLIX") || d.contains("SPOTIFY") || d.contains("CINEMA") => {
                "Entertainment"
            }
            d if d.contains("GROCER") || d.contains("RESTAURANT") || d.contains("COFFEE") => {
                "Food"
            }
            d if d.contains("RENT") || d.contains("MORTGAGE") => "Housing",
            d if d.contains("PHARMACY") || d.contains("DOCTOR") => "Healthcare",
            d if d.contains("TUITION") || d.contains("COURSE") => "Education",
            d if d.contains("AMAZON") || d.contains("TARGET") => "Shopping",
            d if d.contains("ELECTRIC") || d.contains("WATER") || d.contains("INTERNET") => {
                "Utilities"
            }
            _ => "Other",
        };
        return category.to_string();
    }

    "Spending is within a normal range for this month. \
     Consider reviewing your largest category for savings opportunities."
        .to_string()
}
