//! Monte Carlo Shapley approximation
//!
//! Each round draws a uniformly random permutation of the agents and walks
//! it left to right, crediting every agent with its marginal contribution
//! to the growing coalition. Averaged over rounds and normalized, the
//! credits are the attribution values.
//!
//! The characteristic function is additive:
//!
//! ```text
//! v(S) = Σ_{i ∈ S} c_i
//! ```
//!
//! so the marginal contribution of agent `i` is `c_i` regardless of where
//! it lands in the permutation. The result therefore equals
//! `c_i / Σ c` for any round count ≥ 1, up to floating-point summation
//! order. Sampling is kept so that a non-additive coalition value can be
//! dropped in without changing callers.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Additive coalition game over per-agent base contributions
struct AdditiveGame<'a> {
    base: &'a BTreeMap<String, f64>,
}

impl AdditiveGame<'_> {
    /// v(S ∪ {agent}) given v(S)
    #[inline]
    fn value_with(&self, coalition_value: f64, agent: &str) -> f64 {
        coalition_value + self.base.get(agent).copied().unwrap_or(0.0)
    }
}

/// Approximate normalized Shapley values
///
/// - no agents: empty map
/// - one agent with a positive contribution: `{agent: 1.0}`
/// - otherwise: sampled averages normalized to sum to one, or all `0.0`
///   when the averages sum to zero or less (never a uniform split)
///
/// `iterations` below 1 is treated as 1.
pub fn approximate<R>(
    agents: &[String],
    base_contributions: &BTreeMap<String, f64>,
    iterations: usize,
    rng: &mut R,
) -> BTreeMap<String, f64>
where
    R: Rng + ?Sized,
{
    if agents.is_empty() {
        return BTreeMap::new();
    }

    if let [agent] = agents {
        let value = if base_contributions.get(agent).copied().unwrap_or(0.0) > 0.0 {
            1.0
        } else {
            0.0
        };
        return BTreeMap::from([(agent.clone(), value)]);
    }

    let game = AdditiveGame {
        base: base_contributions,
    };
    let iterations = iterations.max(1);

    let mut totals: BTreeMap<&str, f64> = agents.iter().map(|a| (a.as_str(), 0.0)).collect();
    let mut order: Vec<&str> = agents.iter().map(String::as_str).collect();

    for _ in 0..iterations {
        order.shuffle(rng);

        let mut coalition_value = 0.0;
        for agent in &order {
            let with_agent = game.value_with(coalition_value, agent);
            if let Some(total) = totals.get_mut(agent) {
                *total += with_agent - coalition_value;
            }
            coalition_value = with_agent;
        }
    }

    let averages: Vec<(&str, f64)> = totals
        .into_iter()
        .map(|(agent, total)| (agent, total / iterations as f64))
        .collect();
    let sum: f64 = averages.iter().map(|(_, avg)| avg).sum();

    averages
        .into_iter()
        .map(|(agent, avg)| {
            let value = if sum > 0.0 { avg / sum } else { 0.0 };
            (agent.to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn contributions(pairs: &[(&str, f64)]) -> (Vec<String>, BTreeMap<String, f64>) {
        let agents = pairs.iter().map(|(a, _)| a.to_string()).collect();
        let base = pairs.iter().map(|(a, c)| (a.to_string(), *c)).collect();
        (agents, base)
    }

    #[test]
    fn test_single_agent_gets_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let (agents, base) = contributions(&[("A", 0.7)]);
        for iterations in [1, 100, 5000] {
            let values = approximate(&agents, &base, iterations, &mut rng);
            assert_eq!(values, BTreeMap::from([("A".to_string(), 1.0)]));
        }
    }

    #[test]
    fn test_single_zero_agent_gets_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let (agents, base) = contributions(&[("A", 0.0)]);
        let values = approximate(&agents, &base, 100, &mut rng);
        assert_eq!(values["A"], 0.0);
    }

    #[test]
    fn test_matches_direct_normalization() {
        let mut rng = StdRng::seed_from_u64(11);
        let (agents, base) = contributions(&[("A", 0.5), ("B", 0.3), ("C", 0.15), ("D", 0.05)]);
        let sum: f64 = base.values().sum();

        for iterations in [1, 100, 5000] {
            let values = approximate(&agents, &base, iterations, &mut rng);
            for (agent, c) in &base {
                assert!(
                    (values[agent] - c / sum).abs() < 1e-9,
                    "{agent} at {iterations} iterations"
                );
            }
        }
    }

    #[test]
    fn test_all_zero_is_not_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let (agents, base) = contributions(&[("A", 0.0), ("B", 0.0), ("C", 0.0)]);
        let values = approximate(&agents, &base, 100, &mut rng);
        assert_eq!(values.len(), 3);
        assert!(values.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_zero_iterations_still_samples_once() {
        let mut rng = StdRng::seed_from_u64(5);
        let (agents, base) = contributions(&[("A", 0.2), ("B", 0.6)]);
        let values = approximate(&agents, &base, 0, &mut rng);
        assert!((values["A"] - 0.25).abs() < 1e-12);
        assert!((values["B"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_agent_set() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(approximate(&[], &BTreeMap::new(), 100, &mut rng).is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_iterations_do_not_change_result(
            scores in proptest::collection::vec(0.0f64..=1.0, 2..10),
            iterations in 1usize..200,
            seed in proptest::num::u64::ANY,
        ) {
            let agents: Vec<String> = (0..scores.len()).map(|i| format!("agent-{i}")).collect();
            let base: BTreeMap<String, f64> =
                agents.iter().cloned().zip(scores.iter().copied()).collect();

            let mut rng = StdRng::seed_from_u64(seed);
            let once = approximate(&agents, &base, 1, &mut rng);
            let many = approximate(&agents, &base, iterations, &mut rng);
            for agent in &agents {
                proptest::prop_assert!((once[agent] - many[agent]).abs() < 1e-9);
            }
        }
    }
}
