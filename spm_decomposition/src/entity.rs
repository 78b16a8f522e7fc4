//! Mapping values between persons and the units they belong to.
//!
//! Every person belongs to exactly one unit at each level. Unit ids are
//! opaque hash keys; the lookup from id to row is rebuilt for every call
//! because id spaces differ between samples.

use crate::error::DecompositionError;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Resolved person-to-unit membership for one aggregation level.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMembership<K> {
    unit_ids: Vec<K>,
    person_rows: Vec<usize>,
}

impl<K> UnitMembership<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Resolves each person's unit id to the row of that unit in `unit_ids`.
    ///
    /// Fails with `DuplicateUnitId` when `unit_ids` repeats an id and with
    /// `UnitLookup` when a person references an id absent from `unit_ids`.
    pub fn new(unit_ids: &[K], person_to_unit_ids: &[K]) -> Result<Self, DecompositionError> {
        let mut index: HashMap<&K, usize> = HashMap::with_capacity(unit_ids.len());
        for (row, id) in unit_ids.iter().enumerate() {
            if index.insert(id, row).is_some() {
                return Err(DecompositionError::DuplicateUnitId {
                    unit_id: format!("{:?}", id),
                });
            }
        }

        let person_rows = person_to_unit_ids
            .iter()
            .map(|id| {
                index
                    .get(id)
                    .copied()
                    .ok_or_else(|| DecompositionError::UnitLookup {
                        unit_id: format!("{:?}", id),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            unit_ids: unit_ids.to_vec(),
            person_rows,
        })
    }

    pub fn unit_ids(&self) -> &[K] {
        &self.unit_ids
    }

    pub fn n_units(&self) -> usize {
        self.unit_ids.len()
    }

    pub fn n_persons(&self) -> usize {
        self.person_rows.len()
    }

    /// Row of each person's unit.
    pub fn person_rows(&self) -> &[usize] {
        &self.person_rows
    }

    /// Gives every person the value of their unit.
    pub fn project(&self, unit_values: &[f64]) -> Result<Vec<f64>, DecompositionError> {
        if unit_values.len() != self.n_units() {
            return Err(DecompositionError::length_mismatch(
                "unit values",
                self.n_units(),
                unit_values.len(),
            ));
        }
        Ok(self.person_rows.iter().map(|&row| unit_values[row]).collect())
    }

    /// Sums person values into their units. Units without members get 0.
    pub fn aggregate(&self, person_values: &[f64]) -> Result<Vec<f64>, DecompositionError> {
        if person_values.len() != self.n_persons() {
            return Err(DecompositionError::length_mismatch(
                "person values",
                self.n_persons(),
                person_values.len(),
            ));
        }
        let mut totals = vec![0.0; self.n_units()];
        for (&row, &value) in self.person_rows.iter().zip(person_values) {
            totals[row] += value;
        }
        Ok(totals)
    }

    /// Number of persons in each unit.
    pub fn member_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_units()];
        for &row in &self.person_rows {
            counts[row] += 1;
        }
        counts
    }

    /// Divides each unit's value equally among its members.
    ///
    /// Summing the result over all persons recovers the total of the unit
    /// values carried by units that have at least one member.
    pub fn split_evenly(&self, unit_values: &[f64]) -> Result<Vec<f64>, DecompositionError> {
        let counts = self.member_counts();
        let projected = self.project(unit_values)?;
        Ok(projected
            .into_iter()
            .zip(&self.person_rows)
            .map(|(value, &row)| value / counts[row] as f64)
            .collect())
    }
}

/// Gives every person the value of the unit they belong to.
///
/// `unit_values` and `unit_ids` are parallel arrays; `person_to_unit_ids`
/// holds each person's unit id.
pub fn map_unit_to_person<K>(
    unit_values: &[f64],
    unit_ids: &[K],
    person_to_unit_ids: &[K],
) -> Result<Vec<f64>, DecompositionError>
where
    K: Eq + Hash + Clone + Debug,
{
    UnitMembership::new(unit_ids, person_to_unit_ids)?.project(unit_values)
}

/// Sums person values into the units they belong to, in `unit_ids` order.
pub fn aggregate_person_to_unit<K>(
    person_values: &[f64],
    person_to_unit_ids: &[K],
    unit_ids: &[K],
) -> Result<Vec<f64>, DecompositionError>
where
    K: Eq + Hash + Clone + Debug,
{
    UnitMembership::new(unit_ids, person_to_unit_ids)?.aggregate(person_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_map_unit_to_person() {
        let unit_ids = [10_i64, 20, 30];
        let unit_values = [1.0, 2.0, 3.0];
        let persons = [30_i64, 10, 10, 20];
        let mapped = map_unit_to_person(&unit_values, &unit_ids, &persons).unwrap();
        assert_eq!(mapped, vec![3.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_aggregate_leaves_empty_units_at_zero() {
        let unit_ids = [1_i64, 2, 3];
        let persons = [1_i64, 1, 3];
        let totals = aggregate_person_to_unit(&[5.0, 7.0, 2.0], &persons, &unit_ids).unwrap();
        assert_eq!(totals, vec![12.0, 0.0, 2.0]);
    }

    #[test]
    fn test_missing_unit_is_lookup_error() {
        let err = map_unit_to_person(&[1.0], &[1_i64], &[1_i64, 99]).unwrap_err();
        match err {
            DecompositionError::UnitLookup { unit_id } => assert_eq!(unit_id, "99"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_unit_id_is_rejected() {
        let err = UnitMembership::new(&[4_i64, 4], &[4_i64]).unwrap_err();
        assert!(matches!(err, DecompositionError::DuplicateUnitId { .. }));
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let membership = UnitMembership::new(&[1_i64, 2], &[1_i64, 2, 2]).unwrap();
        assert!(matches!(
            membership.project(&[1.0]),
            Err(DecompositionError::LengthMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            membership.aggregate(&[1.0]),
            Err(DecompositionError::LengthMismatch { expected: 3, found: 1, .. })
        ));
    }

    #[test]
    fn test_string_keys_are_supported() {
        let unit_ids = ["hh-b".to_string(), "hh-a".to_string()];
        let persons = ["hh-a".to_string(), "hh-b".to_string(), "hh-a".to_string()];
        let totals = aggregate_person_to_unit(&[1.0, 2.0, 3.0], &persons, &unit_ids).unwrap();
        assert_eq!(totals, vec![2.0, 4.0]);
    }

    #[test]
    fn test_aggregate_conserves_total_and_is_order_independent() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let n_units = rng.gen_range(1..15);
            let unit_ids: Vec<i64> = (0..n_units).map(|i| 1000 + 7 * i as i64).collect();
            let n_persons = rng.gen_range(1..60);
            let links: Vec<i64> = (0..n_persons)
                .map(|_| unit_ids[rng.gen_range(0..n_units)])
                .collect();
            let values: Vec<f64> = (0..n_persons).map(|_| rng.gen_range(-500.0..5000.0)).collect();

            let totals = aggregate_person_to_unit(&values, &links, &unit_ids).unwrap();
            let person_sum: f64 = values.iter().sum();
            let unit_sum: f64 = totals.iter().sum();
            assert!((person_sum - unit_sum).abs() < 1e-6);

            let mut order: Vec<usize> = (0..n_persons).collect();
            order.shuffle(&mut rng);
            let shuffled_links: Vec<i64> = order.iter().map(|&i| links[i]).collect();
            let shuffled_values: Vec<f64> = order.iter().map(|&i| values[i]).collect();
            let shuffled =
                aggregate_person_to_unit(&shuffled_values, &shuffled_links, &unit_ids).unwrap();
            for (a, b) in totals.iter().zip(&shuffled) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_weighted_totals_agree_between_levels() {
        // unit weight equals the weight of each of its members
        let unit_ids = [1_i64, 2];
        let unit_weights = [2.0, 5.0];
        let links = [1_i64, 1, 2];
        let person_values = [10.0, 20.0, 4.0];
        let membership = UnitMembership::new(&unit_ids, &links).unwrap();
        let person_weights = membership.project(&unit_weights).unwrap();

        let unit_values = membership.aggregate(&person_values).unwrap();
        let unit_total: f64 = unit_values.iter().zip(&unit_weights).map(|(v, w)| v * w).sum();
        let person_total: f64 = person_values.iter().zip(&person_weights).map(|(v, w)| v * w).sum();
        assert!((unit_total - person_total).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_with_one_to_one_mapping() {
        let ids = [5_i64, 3, 9];
        let values = [1.5, -2.0, 8.25];
        let membership = UnitMembership::new(&ids, &ids).unwrap();
        let round_trip = membership.project(&membership.aggregate(&values).unwrap()).unwrap();
        assert_eq!(round_trip, values.to_vec());
    }

    #[test]
    fn test_split_evenly_conserves_total() {
        let membership = UnitMembership::new(&[1_i64, 2], &[1_i64, 1, 1, 2]).unwrap();
        let split = membership.split_evenly(&[300.0, 50.0]).unwrap();
        assert_eq!(split, vec![100.0, 100.0, 100.0, 50.0]);
        assert_eq!(membership.member_counts(), vec![3, 1]);
    }
}
