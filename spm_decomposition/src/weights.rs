//! How reweighting the sample shifts child poverty across income quintile and
//! family structure groups.

use crate::error::DecompositionError;
use crate::math::quantile::assign_bucket;
use crate::math::weighted::{weight_sum_where, weighted_mean_where};
use crate::poverty::{child_mask_and_weights, person_values};
use crate::provider::Microsimulation;
use serde::Serialize;

pub const INCOME_QUINTILE_LABELS: [&str; 5] = ["Q1", "Q2", "Q3", "Q4", "Q5"];

/// Indexed by the value of `tax_unit_is_joint`.
pub const FAMILY_STRUCTURE_LABELS: [&str; 2] = ["single parent", "married"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalancingGroup {
    pub label: String,
    pub raw_poverty_rate: f64,
    pub enhanced_poverty_rate: f64,
    pub raw_child_share: f64,
    pub enhanced_child_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GroupStats {
    poverty_rate: f64,
    child_share: f64,
}

/// Child poverty rate and child share of every quintile × family group, in
/// label order. Quintiles come from this sample's own income distribution.
fn group_stats(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<Vec<GroupStats>, DecompositionError> {
    let (children, weights) = child_mask_and_weights(sim, period)?;
    let n = weights.len();
    let in_poverty = person_values(sim, "person_in_poverty", period, n)?;
    let income = person_values(sim, "spm_unit_net_income_reported", period, n)?;
    let joint = person_values(sim, "tax_unit_is_joint", period, n)?;
    let quintiles = assign_bucket(&income, &weights, INCOME_QUINTILE_LABELS.len());

    let total_children = weight_sum_where(&weights, &children);
    let mut stats =
        Vec::with_capacity(INCOME_QUINTILE_LABELS.len() * FAMILY_STRUCTURE_LABELS.len());
    for quintile in 0..INCOME_QUINTILE_LABELS.len() {
        for family in 0..FAMILY_STRUCTURE_LABELS.len() {
            let mask: Vec<bool> = (0..children.len())
                .map(|i| {
                    children[i]
                        && quintiles.bucket_of(i) == quintile
                        && joint[i] == family as f64
                })
                .collect();
            let group_children = weight_sum_where(&weights, &mask);
            stats.push(GroupStats {
                poverty_rate: weighted_mean_where(&in_poverty, &weights, &mask),
                child_share: if total_children > 0.0 {
                    group_children / total_children
                } else {
                    0.0
                },
            });
        }
    }
    Ok(stats)
}

fn group_labels() -> impl Iterator<Item = String> {
    INCOME_QUINTILE_LABELS.iter().flat_map(|q| {
        FAMILY_STRUCTURE_LABELS
            .iter()
            .map(move |f| format!("{} / {}", q, f))
    })
}

/// Compares the raw and enhanced samples group by group. Groups without
/// children in both samples are dropped.
pub fn compute_weight_rebalancing(
    raw: &dyn Microsimulation,
    enhanced: &dyn Microsimulation,
    period: u32,
) -> Result<Vec<RebalancingGroup>, DecompositionError> {
    let raw_stats = group_stats(raw, period)?;
    let enhanced_stats = group_stats(enhanced, period)?;

    Ok(group_labels()
        .zip(raw_stats.iter().zip(&enhanced_stats))
        .filter(|(_, (r, e))| r.child_share > 0.0 || e.child_share > 0.0)
        .map(|(label, (r, e))| RebalancingGroup {
            label,
            raw_poverty_rate: r.poverty_rate,
            enhanced_poverty_rate: e.poverty_rate,
            raw_child_share: r.child_share,
            enhanced_child_share: e.child_share,
        })
        .collect())
}
