use crate::math::weighted::{weight_sum_where, weighted_quantile_breakpoints};

/// Result of grouping records into equal-weight buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketAssignment {
    buckets: Vec<usize>,
    breakpoints: Vec<f64>,
    n_buckets: usize,
}

impl BucketAssignment {
    /// Bucket index of every record, in input order.
    pub fn buckets(&self) -> &[usize] {
        &self.buckets
    }

    /// The `n_buckets - 1` breakpoints used for the assignment.
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn n_buckets(&self) -> usize {
        self.n_buckets
    }

    pub fn bucket_of(&self, record: usize) -> usize {
        self.buckets[record]
    }

    /// Boolean mask selecting the records of bucket `k`.
    pub fn mask(&self, k: usize) -> Vec<bool> {
        self.buckets.iter().map(|&b| b == k).collect()
    }

    /// Total weight per bucket. Sums to the total of `weights`.
    pub fn bucket_weights(&self, weights: &[f64]) -> Vec<f64> {
        (0..self.n_buckets)
            .map(|k| weight_sum_where(weights, &self.mask(k)))
            .collect()
    }
}

/// Assigns every record to one of `n_buckets` equal-weight buckets.
///
/// Breakpoints are placed at the cumulative weight fractions `k / n_buckets`
/// for `k = 1..n_buckets`. A record lands in bucket `k` when its value is
/// strictly greater than breakpoint `k - 1` and not strictly greater than
/// breakpoint `k`, so a value equal to a breakpoint falls into the lower
/// bucket. Buckets can be empty when many records tie at one value.
///
/// A request for zero buckets is treated as a single bucket.
pub fn assign_bucket(values: &[f64], weights: &[f64], n_buckets: usize) -> BucketAssignment {
    let n_buckets = n_buckets.max(1);
    let fractions: Vec<f64> = (1..n_buckets)
        .map(|k| k as f64 / n_buckets as f64)
        .collect();
    let breakpoints = weighted_quantile_breakpoints(values, weights, &fractions);

    let buckets = values
        .iter()
        .map(|&v| breakpoints.partition_point(|&bp| v > bp))
        .collect();

    BucketAssignment {
        buckets,
        breakpoints,
        n_buckets,
    }
}
