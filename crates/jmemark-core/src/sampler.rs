//! Seedable sampling of variable values for checking trials.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::model::{CheckingConfig, SampleDistribution, Value};
use crate::scope::{normalize_name, VariableBindingSet, VariableScope};

/// Draws variable binding sets from an explicit seed.
pub struct VariableSampler {
    rng: ChaCha20Rng,
}

impl VariableSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Draw `config.points` binding sets over `scope`.
    ///
    /// Names already bound in the scope are reused rather than sampled. Names
    /// are normalized and drawn in sorted order, so the caller's ordering
    /// doesn't affect the values.
    pub fn sample<'a, I, S>(
        &mut self,
        names: I,
        config: &CheckingConfig,
        scope: &'a VariableScope,
    ) -> Vec<VariableBindingSet<'a>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let free: BTreeSet<String> = names
            .into_iter()
            .map(|n| normalize_name(n.as_ref()))
            .filter(|n| !scope.contains(n))
            .collect();

        (0..config.points)
            .map(|_| {
                let sampled: BTreeMap<String, Value> = free
                    .iter()
                    .map(|name| (name.clone(), Value::Number(self.draw(config))))
                    .collect();
                VariableBindingSet::new(scope, sampled)
            })
            .collect()
    }

    fn draw(&mut self, config: &CheckingConfig) -> f64 {
        let (start, end) = (config.range_start, config.range_end);
        match config.distribution {
            SampleDistribution::Uniform => {
                if start >= end {
                    start
                } else {
                    self.rng.gen_range(start..=end)
                }
            }
            SampleDistribution::Integer => {
                let lo = start.ceil() as i64;
                let hi = end.floor() as i64;
                if lo >= hi {
                    lo as f64
                } else {
                    self.rng.gen_range(lo..=hi) as f64
                }
            }
        }
    }
}
