//! Intelligent provider router (spec C2).
//!
//! Scores healthy providers against a request's routing inputs, selects the
//! best fit, and on retryable mid-stream failure fails over to the
//! next-best candidate. Non-retryable errors and failures once streaming
//! has already produced output propagate instead of silently failing over
//! (spec §4.2: partial-token identity can't be preserved across providers).

pub mod scoring;

use std::sync::Arc;

use crate::provider::{CancelToken, CompletionOptions, CompletionResponse, Message, OnEvent, Provider, ProviderError};

pub use scoring::{RoutingInputs, RoutingWeights};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no provider available for this request")]
    NoProviderAvailable,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct Router {
    providers: Vec<Arc<dyn Provider>>,
    weights: RoutingWeights,
    max_fallbacks: Option<usize>,
}

impl Router {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers, weights: RoutingWeights::default(), max_fallbacks: None }
    }

    pub fn with_weights(mut self, weights: RoutingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_fallbacks(mut self, n: usize) -> Self {
        self.max_fallbacks = Some(n);
        self
    }

    /// Providers eligible for `inputs`, best-scored first.
    fn candidates(&self, inputs: &RoutingInputs) -> Vec<Arc<dyn Provider>> {
        let mut scored: Vec<(f64, usize, Arc<dyn Provider>)> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                if inputs.forbidden_providers.iter().any(|f| f == p.name()) {
                    return false;
                }
                let health = p.health();
                if health.status == crate::provider::HealthStatus::Unhealthy {
                    return false;
                }
                scoring::supports_all(&p.capabilities(), &inputs.required_capabilities)
            })
            .map(|(idx, p)| {
                let preferred_rank = inputs
                    .preferred_providers
                    .iter()
                    .position(|name| name == p.name())
                    .unwrap_or(usize::MAX);
                (scoring::score(p.as_ref(), inputs, &self.weights), preferred_rank, idx, p.clone())
            })
            .map(|(s, pref, idx, p)| (s, pref * self.providers.len() + idx, p))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, p)| p).collect()
    }

    pub async fn complete(
        &self,
        inputs: &RoutingInputs,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, RouterError> {
        let candidates = self.candidates(inputs);
        if candidates.is_empty() {
            return Err(RouterError::NoProviderAvailable);
        }

        let max_attempts = self.max_fallbacks.unwrap_or(candidates.len()).min(candidates.len()).max(1);
        let mut last_err = None;

        for provider in candidates.into_iter().take(max_attempts) {
            match provider.complete(messages, options).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => {
                    log::warn!("provider '{}' failed retryably, trying next candidate: {e}", provider.name());
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.map(RouterError::Provider).unwrap_or(RouterError::NoProviderAvailable))
    }

    /// Streaming route. Does not fail over once a stream has started: partial
    /// token identity can't be preserved across providers, so a mid-stream
    /// error is surfaced after a terminal `done=true` event instead.
    pub async fn complete_stream(
        &self,
        inputs: &RoutingInputs,
        messages: &[Message],
        options: &CompletionOptions,
        on_event: OnEvent<'_>,
        cancel: &CancelToken,
    ) -> Result<(), RouterError> {
        let candidates = self.candidates(inputs);
        let provider = candidates.into_iter().next().ok_or(RouterError::NoProviderAvailable)?;
        provider.complete_stream(messages, options, on_event, cancel).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OllamaProvider;

    #[test]
    fn empty_provider_list_has_no_candidates() {
        let router = Router::new(vec![]);
        let inputs = RoutingInputs::default();
        assert!(router.candidates(&inputs).is_empty());
    }

    #[tokio::test]
    async fn no_candidates_surfaces_no_provider_available() {
        let router = Router::new(vec![]);
        let err = router.complete(&RoutingInputs::default(), &[], &CompletionOptions::default()).await.unwrap_err();
        assert!(matches!(err, RouterError::NoProviderAvailable));
    }

    #[test]
    fn forbidden_provider_is_excluded() {
        let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::new("llama3".into(), None));
        let router = Router::new(vec![provider]);
        let mut inputs = RoutingInputs::default();
        inputs.forbidden_providers.push("ollama".to_string());
        assert!(router.candidates(&inputs).is_empty());
    }
}
