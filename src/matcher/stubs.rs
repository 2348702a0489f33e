use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::matcher::model::{MatchError, MatchRequest, MatchResponse, MatcherService, SemanticMatch};

/// Returns a preset response and counts invocations.
pub struct Scripted {
    matches: Vec<SemanticMatch>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(matches: Vec<SemanticMatch>) -> Scripted {
        Scripted {
            matches,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatcherService for Scripted {
    async fn match_batch(&self, _request: MatchRequest) -> Result<MatchResponse, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MatchResponse {
            matches: self
                .matches
                .iter()
                .map(|m| SemanticMatch {
                    name: m.name.clone(),
                    parameter_index: m.parameter_index,
                    confidence: m.confidence,
                    reasoning: m.reasoning.clone(),
                })
                .collect(),
        })
    }
}

pub struct AlwaysUnavailable;

#[async_trait]
impl MatcherService for AlwaysUnavailable {
    async fn match_batch(&self, _request: MatchRequest) -> Result<MatchResponse, MatchError> {
        Err(MatchError::Unavailable("service offline".to_string()))
    }
}

/// Sleeps past any reasonable deadline, for timeout tests.
pub struct Stalls {
    pub delay_ms: u64,
}

#[async_trait]
impl MatcherService for Stalls {
    async fn match_batch(&self, _request: MatchRequest) -> Result<MatchResponse, MatchError> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(MatchResponse { matches: vec![] })
    }
}
