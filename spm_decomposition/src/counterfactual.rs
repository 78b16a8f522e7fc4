//! Remove one contribution from resources, recompute the poverty flag and
//! measure the weighted swing.

use crate::entity::UnitMembership;
use crate::error::DecompositionError;
use crate::math::weighted::{weighted_mean_where, weighted_total_where};
use getset::{CopyGetters, Getters};
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// `resource < threshold`, as 0/1.
pub fn poverty_flags(resource: &[f64], threshold: &[f64]) -> Vec<f64> {
    resource
        .iter()
        .zip(threshold)
        .map(|(r, t)| if r < t { 1.0 } else { 0.0 })
        .collect()
}

/// Person-level baseline: resources, thresholds, weights and the poverty
/// flags they imply.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct PovertyBaseline {
    resource: Vec<f64>,
    threshold: Vec<f64>,
    weights: Vec<f64>,
    flags: Vec<f64>,
}

impl PovertyBaseline {
    /// Builds the baseline with flags computed from `resource < threshold`.
    pub fn new(
        resource: Vec<f64>,
        threshold: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<Self, DecompositionError> {
        let flags = poverty_flags(&resource, &threshold);
        Self::with_baseline(flags, resource, threshold, weights)
    }

    /// Builds the baseline from externally computed flags.
    pub fn with_baseline(
        flags: Vec<f64>,
        resource: Vec<f64>,
        threshold: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<Self, DecompositionError> {
        let n = resource.len();
        for (context, len) in [
            ("threshold", threshold.len()),
            ("person weights", weights.len()),
            ("baseline flags", flags.len()),
        ] {
            if len != n {
                return Err(DecompositionError::length_mismatch(context, n, len));
            }
        }
        Ok(Self {
            resource,
            threshold,
            weights,
            flags,
        })
    }

    pub fn len(&self) -> usize {
        self.resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_empty()
    }

    /// Subtracts a person-level contribution from resources.
    pub fn remove_contribution(
        &self,
        contribution: &[f64],
    ) -> Result<Counterfactual<'_>, DecompositionError> {
        if contribution.len() != self.len() {
            return Err(DecompositionError::length_mismatch(
                "person contribution",
                self.len(),
                contribution.len(),
            ));
        }
        let resource: Vec<f64> = self
            .resource
            .iter()
            .zip(contribution)
            .map(|(r, c)| r - c)
            .collect();
        let flags = poverty_flags(&resource, &self.threshold);
        Ok(Counterfactual {
            baseline: self,
            flags,
        })
    }

    /// Projects a unit-level contribution to persons, then removes it.
    pub fn remove_unit_contribution<K>(
        &self,
        membership: &UnitMembership<K>,
        contribution: &[f64],
    ) -> Result<Counterfactual<'_>, DecompositionError>
    where
        K: Eq + Hash + Clone + Debug,
    {
        let per_person = membership.project(contribution)?;
        self.remove_contribution(&per_person)
    }
}

/// Poverty flags after one contribution was removed.
#[derive(Debug, Clone)]
pub struct Counterfactual<'a> {
    baseline: &'a PovertyBaseline,
    flags: Vec<f64>,
}

impl Counterfactual<'_> {
    pub fn flags(&self) -> &[f64] {
        &self.flags
    }

    /// Rates with and without the contribution and the weighted number of
    /// persons whose flag changed. Negative swings are kept as they are.
    pub fn effect(&self, mask: Option<&[bool]>) -> SwingEffect {
        let weights = self.baseline.weights();
        let all;
        let mask = match mask {
            Some(mask) => mask,
            None => {
                all = vec![true; weights.len()];
                &all
            }
        };
        let swing: Vec<f64> = self
            .flags
            .iter()
            .zip(self.baseline.flags())
            .map(|(cf, base)| cf - base)
            .collect();

        SwingEffect {
            rate_with: weighted_mean_where(self.baseline.flags(), weights, mask),
            rate_without: weighted_mean_where(&self.flags, weights, mask),
            swing_count: weighted_total_where(&swing, weights, mask),
        }
    }
}

/// Outcome of removing one contribution within one subgroup.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct SwingEffect {
    rate_with: f64,
    rate_without: f64,
    swing_count: f64,
}
