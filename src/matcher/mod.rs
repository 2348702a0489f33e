pub mod model;
pub mod stubs;
pub mod subprocess;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::descriptor::PluginDescriptor;
use crate::matcher::model::{
    ControlName, MatchError, MatchRequest, MatchType, MatcherService, ParameterMatch,
    RequestControl, RequestParameter,
};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Confidence attached to the trailing-numeric-suffix heuristic. Near zero:
/// the heuristic conflates label numbering with parameter numbering and must
/// never look trustworthy downstream.
pub const FALLBACK_CONFIDENCE: f64 = 0.05;

#[derive(Clone, Debug)]
pub struct MatchOptions {
    pub min_confidence: f64,
    pub timeout_ms: u64,
    /// Derive a parameter index from a trailing number in the control label
    /// when nothing else matched. Off by default: unmatched controls keep no
    /// parameter binding at all.
    pub numeric_suffix_fallback: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            numeric_suffix_fallback: false,
        }
    }
}

/// What a matching pass produced. Degradation is data, not an error: a
/// failed service call leaves `matches` partial and adds a warning.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matches: Vec<ParameterMatch>,
    pub warnings: Vec<String>,
    pub skipped: bool,
}

pub type SharedMatcherService = Arc<dyn MatcherService + Send + Sync + 'static>;

/// Confidence-scored control-label to parameter-index matching:
/// exact names first, one batched semantic call for the rest, local
/// degradation when the service misbehaves.
pub struct ParameterMatcher {
    service: SharedMatcherService,
}

impl ParameterMatcher {
    pub fn new(service: SharedMatcherService) -> ParameterMatcher {
        ParameterMatcher { service }
    }

    pub async fn match_parameters(
        &self,
        controls: &[ControlName],
        descriptor: &PluginDescriptor,
        options: &MatchOptions,
    ) -> MatchOutcome {
        if controls.is_empty() || controls.iter().all(|c| is_generic_name(&c.name)) {
            info!(
                "Parameter matching skipped: no user-assigned control labels for '{}'.",
                descriptor.plugin.name
            );
            return MatchOutcome {
                skipped: true,
                ..Default::default()
            };
        }

        let mut outcome = MatchOutcome::default();
        let mut unresolved: Vec<&ControlName> = Vec::new();

        for control in controls {
            let exact = descriptor
                .parameters
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(&control.name));
            match exact {
                Some(parameter) => outcome.matches.push(ParameterMatch {
                    control_name: control.name.clone(),
                    cc: control.cc,
                    parameter_index: parameter.index,
                    parameter_name: parameter.name.clone(),
                    confidence: 1.0,
                    match_type: MatchType::Exact,
                    below_threshold: false,
                }),
                None => unresolved.push(control),
            }
        }

        if !unresolved.is_empty() {
            self.match_semantic(&mut outcome, &unresolved, descriptor, options)
                .await;
        }

        if options.numeric_suffix_fallback {
            let resolved: Vec<String> = outcome
                .matches
                .iter()
                .map(|m| m.control_name.to_lowercase())
                .collect();
            for control in controls {
                if resolved.contains(&control.name.to_lowercase()) {
                    continue;
                }
                if let Some(m) = numeric_suffix_match(control, descriptor, options) {
                    outcome.matches.push(m);
                }
            }
        }

        outcome
    }

    async fn match_semantic(
        &self,
        outcome: &mut MatchOutcome,
        unresolved: &[&ControlName],
        descriptor: &PluginDescriptor,
        options: &MatchOptions,
    ) {
        let request = MatchRequest {
            controls: unresolved
                .iter()
                .map(|c| RequestControl {
                    name: c.name.clone(),
                    cc: c.cc.as_u8(),
                })
                .collect(),
            parameters: descriptor
                .parameters
                .iter()
                .map(|p| RequestParameter {
                    index: p.index,
                    name: p.name.clone(),
                    group: p.group.clone(),
                })
                .collect(),
        };

        let deadline = Duration::from_millis(options.timeout_ms);
        let response = match tokio::time::timeout(deadline, self.service.match_batch(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!("Parameter matching degraded: {error}");
                outcome
                    .warnings
                    .push(format!("Parameter matching degraded: {error}"));
                return;
            }
            Err(_) => {
                let error = MatchError::Timeout {
                    timeout_ms: options.timeout_ms,
                };
                warn!("Parameter matching degraded: {error}");
                outcome
                    .warnings
                    .push(format!("Parameter matching degraded: {error}"));
                return;
            }
        };

        for semantic in response.matches {
            let control = unresolved
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&semantic.name));
            let control = match control {
                Some(control) => control,
                None => {
                    outcome.warnings.push(format!(
                        "Matching service answered for unknown control '{}'.",
                        semantic.name
                    ));
                    continue;
                }
            };
            let parameter = match descriptor.parameter(semantic.parameter_index) {
                Some(parameter) => parameter,
                None => {
                    outcome.warnings.push(format!(
                        "Matching service proposed unknown parameter index {} for '{}'.",
                        semantic.parameter_index, semantic.name
                    ));
                    continue;
                }
            };

            let confidence = semantic.confidence.clamp(0.0, 1.0);
            outcome.matches.push(ParameterMatch {
                control_name: control.name.clone(),
                cc: control.cc,
                parameter_index: parameter.index,
                parameter_name: parameter.name.clone(),
                confidence,
                match_type: MatchType::Semantic,
                below_threshold: confidence < options.min_confidence,
            });
        }
    }
}

/// Factory-default labels ("Control 16", "Control 17", ...) carry no intent
/// worth a service round trip.
pub fn is_generic_name(name: &str) -> bool {
    match name.strip_prefix("Control ") {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn numeric_suffix_match(
    control: &ControlName,
    descriptor: &PluginDescriptor,
    options: &MatchOptions,
) -> Option<ParameterMatch> {
    let digits: String = control
        .name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let index: u32 = digits.parse().ok()?;
    let parameter = descriptor.parameter(index)?;

    Some(ParameterMatch {
        control_name: control.name.clone(),
        cc: control.cc,
        parameter_index: parameter.index,
        parameter_name: parameter.name.clone(),
        confidence: FALLBACK_CONFIDENCE,
        match_type: MatchType::Fallback,
        below_threshold: FALLBACK_CONFIDENCE < options.min_confidence,
    })
}
