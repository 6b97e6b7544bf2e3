use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use super::types::{HealthCheckError, RiskProfile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBucket {
    /// Suggested risk level shown to users picking this bucket.
    pub level: i32,
    pub label: &'static str,
    pub expected_return: f64,
    pub volatility: f64,
}

/// Buckets keyed by exclusive upper risk bound.
const BOUNDED_BUCKETS: [(i32, ReturnBucket); 4] = [
    (
        2,
        ReturnBucket {
            level: 1,
            label: "Extremely Safe",
            expected_return: 0.01,
            volatility: 0.01,
        },
    ),
    (
        4,
        ReturnBucket {
            level: 3,
            label: "Low Risk",
            expected_return: 0.03,
            volatility: 0.08,
        },
    ),
    (
        6,
        ReturnBucket {
            level: 5,
            label: "Moderate Risk",
            expected_return: 0.05,
            volatility: 0.10,
        },
    ),
    (
        8,
        ReturnBucket {
            level: 7,
            label: "Risky",
            expected_return: 0.07,
            volatility: 0.15,
        },
    ),
];

/// Every level at or above the last bound.
const TOP_BUCKET: ReturnBucket = ReturnBucket {
    level: 9,
    label: "Very Risky",
    expected_return: 0.10,
    volatility: 0.20,
};

pub fn return_bucket(risk_level: i32) -> ReturnBucket {
    BOUNDED_BUCKETS
        .iter()
        .find(|(bound, _)| risk_level < *bound)
        .map_or(TOP_BUCKET, |(_, bucket)| *bucket)
}

pub fn return_buckets() -> impl Iterator<Item = ReturnBucket> {
    BOUNDED_BUCKETS
        .iter()
        .map(|(_, bucket)| *bucket)
        .chain(std::iter::once(TOP_BUCKET))
}

impl RiskProfile {
    pub fn bucket(&self) -> ReturnBucket {
        return_bucket(self.risk_level)
    }
}

/// Gaussian annual return model for one risk bucket.
#[derive(Debug, Clone, Copy)]
pub struct ReturnSampler {
    distribution: Normal<f64>,
}

impl ReturnSampler {
    pub fn new(risk: RiskProfile) -> Result<Self, HealthCheckError> {
        let bucket = risk.bucket();
        let distribution = Normal::new(bucket.expected_return, bucket.volatility)?;
        Ok(Self { distribution })
    }

    pub fn sample_into<R: Rng + ?Sized>(&self, out: &mut Vec<f64>, num_years: usize, rng: &mut R) {
        out.clear();
        out.extend((0..num_years).map(|_| self.distribution.sample(rng)));
    }

    pub fn sample<R: Rng + ?Sized>(&self, num_years: usize, rng: &mut R) -> Vec<f64> {
        let mut out = Vec::with_capacity(num_years);
        self.sample_into(&mut out, num_years, rng);
        out
    }
}

pub fn sample_annual_returns<R: Rng + ?Sized>(
    risk: RiskProfile,
    num_years: usize,
    rng: &mut R,
) -> Result<Vec<f64>, HealthCheckError> {
    Ok(ReturnSampler::new(risk)?.sample(num_years, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert, proptest};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn bucket_boundaries_are_half_open_on_upper_side() {
        for (level, expected_mean, expected_vol) in [
            (i32::MIN, 0.01, 0.01),
            (-3, 0.01, 0.01),
            (1, 0.01, 0.01),
            (2, 0.03, 0.08),
            (3, 0.03, 0.08),
            (4, 0.05, 0.10),
            (5, 0.05, 0.10),
            (6, 0.07, 0.15),
            (7, 0.07, 0.15),
            (8, 0.10, 0.20),
            (9, 0.10, 0.20),
            (i32::MAX, 0.10, 0.20),
        ] {
            let bucket = return_bucket(level);
            assert_eq!(bucket.expected_return, expected_mean, "risk level {level}");
            assert_eq!(bucket.volatility, expected_vol, "risk level {level}");
        }
    }

    #[test]
    fn suggested_levels_map_to_their_own_bucket() {
        for bucket in return_buckets() {
            assert_eq!(return_bucket(bucket.level), bucket);
        }
    }

    #[test]
    fn bucket_listing_ends_with_the_open_ended_bucket() {
        let labels = return_buckets().map(|b| b.label).collect::<Vec<_>>();
        assert_eq!(
            labels,
            ["Extremely Safe", "Low Risk", "Moderate Risk", "Risky", "Very Risky"]
        );
    }

    #[test]
    fn sampling_is_reproducible_for_identical_seeds() {
        let risk = RiskProfile { risk_level: 5 };
        let a = sample_annual_returns(risk, 30, &mut StdRng::seed_from_u64(9)).expect("valid");
        let b = sample_annual_returns(risk, 30, &mut StdRng::seed_from_u64(9)).expect("valid");
        let c = sample_annual_returns(risk, 30, &mut StdRng::seed_from_u64(10)).expect("valid");
        assert_eq!(a.len(), 30);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sample_mean_tracks_bucket_expected_return() {
        let risk = RiskProfile { risk_level: 9 };
        let draws = sample_annual_returns(risk, 200_000, &mut StdRng::seed_from_u64(42))
            .expect("valid");
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!((mean - 0.10).abs() < 0.005, "mean {mean}");
        assert!((var.sqrt() - 0.20).abs() < 0.005, "stddev {}", var.sqrt());
    }

    proptest! {
        #[test]
        fn prop_every_risk_level_has_a_bucket(level in any::<i32>()) {
            let bucket = return_bucket(level);
            prop_assert!(return_buckets().any(|b| b == bucket));
        }
    }
}
