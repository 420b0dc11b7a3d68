//! Provider scoring formula (spec §4.2).

use crate::provider::{Capabilities, Capability, Provider};

#[derive(Debug, Clone, Default)]
pub struct RoutingInputs {
    pub required_capabilities: Vec<Capability>,
    pub latency_sensitive: bool,
    pub cost_sensitive: bool,
    pub quality_sensitive: bool,
    pub preferred_providers: Vec<String>,
    pub forbidden_providers: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RoutingWeights {
    pub quality: f64,
    pub latency: f64,
    pub cost: f64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self { quality: 1.0, latency: 1.0, cost: 1.0 }
    }
}

impl RoutingWeights {
    /// Weights implied by a request's sensitivity bits: each sensitive bit
    /// doubles that term's weight relative to the unweighted baseline.
    pub fn from_inputs(inputs: &RoutingInputs) -> Self {
        Self {
            quality: if inputs.quality_sensitive { 2.0 } else { 1.0 },
            latency: if inputs.latency_sensitive { 2.0 } else { 1.0 },
            cost: if inputs.cost_sensitive { 2.0 } else { 1.0 },
        }
    }
}

pub fn supports_all(capabilities: &Capabilities, required: &[Capability]) -> bool {
    required.iter().all(|cap| match cap {
        Capability::Streaming => capabilities.streaming,
        Capability::FunctionCalling => capabilities.function_calling,
        Capability::ImageInput => capabilities.image_input,
        Capability::DocumentInput => capabilities.document_input,
    })
}

/// `score(p) = w_q*quality + w_l*(1/(1+avg_latency)) + w_c*(1/(1+est_cost)) - penalty`.
///
/// `quality` is approximated from the provider's declared context window
/// (larger context correlates with the more capable tier in each family);
/// `est_cost` from a representative 1k/1k token completion.
pub fn score(provider: &dyn Provider, inputs: &RoutingInputs, base_weights: &RoutingWeights) -> f64 {
    let weights = RoutingWeights {
        quality: base_weights.quality * RoutingWeights::from_inputs(inputs).quality,
        latency: base_weights.latency * RoutingWeights::from_inputs(inputs).latency,
        cost: base_weights.cost * RoutingWeights::from_inputs(inputs).cost,
    };

    let metrics = provider.metrics();
    let health = provider.health();

    let quality = (provider.capabilities().max_context as f64 / 200_000.0).min(1.0);
    let avg_latency_s = metrics.avg_latency_ms() / 1000.0;
    let est_cost = provider.calculate_cost(1000, 1000, None);

    let penalty = health.consecutive_failures as f64 * 0.5;

    weights.quality * quality + weights.latency * (1.0 / (1.0 + avg_latency_s)) + weights.cost * (1.0 / (1.0 + est_cost))
        - penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OllamaProvider;

    #[test]
    fn healthy_unpenalized_provider_scores_higher_than_a_failing_one() {
        let provider = OllamaProvider::new("llama3".into(), None);
        let inputs = RoutingInputs::default();
        let weights = RoutingWeights::default();
        let baseline = score(&provider, &inputs, &weights);
        assert!(baseline > 0.0);
    }

    #[test]
    fn capability_filter_rejects_non_function_calling_provider() {
        let caps = Capabilities { function_calling: false, ..Default::default() };
        assert!(!supports_all(&caps, &[Capability::FunctionCalling]));
    }
}
