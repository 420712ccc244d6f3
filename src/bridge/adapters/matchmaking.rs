//! Matchmaker implementations.

use rand::seq::SliceRandom;
use serde_json::{Map, Value};
use tracing::debug;

use crate::bridge::{domain::ServiceInstance, ports::Matchmaker};

/// Picks a candidate uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomMatchmaker;

impl Matchmaker for RandomMatchmaker {
    fn select(
        &self,
        candidates: &[ServiceInstance],
        _context: &Map<String, Value>,
    ) -> Option<ServiceInstance> {
        let selected = candidates.choose(&mut rand::thread_rng()).cloned();
        if let Some(instance) = &selected {
            debug!(
                provider = %instance.provider,
                candidates = candidates.len(),
                "matchmaker selected candidate"
            );
        }
        selected
    }
}

/// Always picks the first candidate. Useful where selection has to be
/// reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidateMatchmaker;

impl Matchmaker for FirstCandidateMatchmaker {
    fn select(
        &self,
        candidates: &[ServiceInstance],
        _context: &Map<String, Value>,
    ) -> Option<ServiceInstance> {
        candidates.first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::domain::{ServiceDefinitionName, ServiceInstanceId, SystemName};
    use rstest::rstest;

    fn instance(provider: &str) -> ServiceInstance {
        ServiceInstance::new(
            ServiceInstanceId::new(format!("{provider}|interfaceBridgeManagement|1.0.0"))
                .expect("valid instance id"),
            SystemName::new(provider).expect("valid system name"),
            ServiceDefinitionName::new("interfaceBridgeManagement")
                .expect("valid service definition"),
        )
    }

    #[rstest]
    fn empty_input_selects_nothing() {
        let context = Map::new();
        assert!(RandomMatchmaker.select(&[], &context).is_none());
        assert!(FirstCandidateMatchmaker.select(&[], &context).is_none());
    }

    #[rstest]
    fn random_selection_is_a_member_of_the_input() {
        let candidates = vec![instance("TranslatorA"), instance("TranslatorB")];
        let context = Map::new();
        for _ in 0..32 {
            let selected = RandomMatchmaker
                .select(&candidates, &context)
                .expect("a candidate is selected");
            assert!(candidates.contains(&selected));
        }
    }

    #[rstest]
    fn first_candidate_selection_is_stable() {
        let candidates = vec![instance("TranslatorA"), instance("TranslatorB")];
        let selected = FirstCandidateMatchmaker.select(&candidates, &Map::new());
        assert_eq!(selected, candidates.first().cloned());
    }
}
