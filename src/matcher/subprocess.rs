use async_trait::async_trait;
use std::collections::HashMap;

use crate::matcher::model::{MatchError, MatchRequest, MatchResponse, MatcherService};

#[derive(Clone, Debug)]
pub struct Config {
    pub envs: HashMap<String, String>,
    pub command: String,
    pub args: Vec<String>,
}

impl Config {
    pub fn command(command: impl Into<String>) -> Config {
        Config {
            envs: HashMap::new(),
            command: command.into(),
            args: Vec::new(),
        }
    }
}

/// Matching service backed by an external command (typically an AI CLI).
/// The batched request travels as the final argument in JSON form; the
/// command answers with a single JSON object on stdout:
/// `{"matches": [{"name", "parameter_index", "confidence", "reasoning"?}]}`.
pub struct SubprocessMatcher {
    config: Config,
}

impl SubprocessMatcher {
    pub fn new(config: Config) -> SubprocessMatcher {
        SubprocessMatcher { config }
    }
}

#[async_trait]
impl MatcherService for SubprocessMatcher {
    async fn match_batch(&self, request: MatchRequest) -> Result<MatchResponse, MatchError> {
        let payload = serde_json::to_string(&request)
            .map_err(|e| MatchError::Unavailable(format!("request serialization failed: {e}")))?;

        let output = async_process::Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(payload)
            .envs(&self.config.envs)
            .output()
            .await
            .map_err(|e| MatchError::Unavailable(format!("{}: {e}", self.config.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MatchError::Unavailable(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| MatchError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::model::Cc;
    use crate::matcher::model::{RequestControl, RequestParameter};

    fn request() -> MatchRequest {
        MatchRequest {
            controls: vec![RequestControl {
                name: "Brightness".to_string(),
                cc: Cc::from_u8(13).unwrap().as_u8(),
            }],
            parameters: vec![RequestParameter {
                index: 1,
                name: "Filter Cutoff".to_string(),
                group: None,
            }],
        }
    }

    #[tokio::test]
    async fn missing_command_reports_unavailable() {
        let matcher = SubprocessMatcher::new(Config::command("controlmap-no-such-matcher"));
        let err = matcher.match_batch(request()).await.unwrap_err();
        assert!(matches!(err, MatchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unparseable_stdout_reports_parse_error() {
        let mut config = Config::command("echo");
        config.args = vec!["not json".to_string()];
        let matcher = SubprocessMatcher::new(config);
        let err = matcher.match_batch(request()).await.unwrap_err();
        assert!(matches!(err, MatchError::Parse(_)));
    }
}
