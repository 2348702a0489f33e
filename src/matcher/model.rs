use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::midi::model::Cc;

/// Label + wire address of one control, as handed to the matcher.
#[derive(Clone, Debug)]
pub struct ControlName {
    pub name: String,
    pub cc: Cc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Semantic,
    Fallback,
}

/// One resolved control-to-parameter binding with its quality estimate.
/// `confidence` is always within [0, 1]; exact matches are exactly 1.0.
#[derive(Clone, Debug, Serialize)]
pub struct ParameterMatch {
    pub control_name: String,
    pub cc: Cc,
    pub parameter_index: u32,
    pub parameter_name: String,
    pub confidence: f64,
    pub match_type: MatchType,
    pub below_threshold: bool,
}

// Wire contract of the external matching service. The full unresolved-name
// list and the full parameter list travel in one request.

#[derive(Debug, Serialize)]
pub struct MatchRequest {
    pub controls: Vec<RequestControl>,
    pub parameters: Vec<RequestParameter>,
}

#[derive(Debug, Serialize)]
pub struct RequestControl {
    pub name: String,
    pub cc: u8,
}

#[derive(Debug, Serialize)]
pub struct RequestParameter {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<SemanticMatch>,
}

#[derive(Debug, Deserialize)]
pub struct SemanticMatch {
    pub name: String,
    pub parameter_index: u32,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Matching service unavailable. Reason: {0}.")]
    Unavailable(String),
    #[error("Matching service timed out after {timeout_ms} ms.")]
    Timeout { timeout_ms: u64 },
    #[error("Matching service returned an unparseable payload. Reason: {0}.")]
    Parse(String),
}

/// Port to the external semantic matching service. One call per deployment,
/// never one per control.
#[async_trait]
pub trait MatcherService {
    async fn match_batch(&self, request: MatchRequest) -> Result<MatchResponse, MatchError>;
}
