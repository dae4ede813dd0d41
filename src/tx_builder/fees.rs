//! Dynamic priority fees
//!
//! Samples recent prioritization fees through the failover pool, takes a
//! nearest-rank percentile over the non-zero samples, and clamps the result
//! to the tier minimum and the configured maximum. A failed sample query
//! falls back to a fixed price; fee lookup never blocks construction.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::FeeConfig;
use crate::metrics::metrics;
use crate::rpc_manager::ChainRpc;
use crate::types::lamports_to_sol;

/// Compute-unit limit attached when none is configured
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 200_000;

/// Base fee charged per required signature
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

/// Priority fee tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Low,
    #[default]
    Medium,
    High,
}

impl FeeTier {
    /// Percentile of recent samples this tier pays
    pub fn percentile(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.50,
            Self::High => 0.75,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown fee tier '{other}' (expected low, medium or high)")),
        }
    }
}

/// Nearest-rank percentile: `ceil(N * p) - 1` in 0-based indexing
///
/// Sorts a copy of `samples`; returns `None` for an empty slice.
pub fn percentile(samples: &[u64], p: f64) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    let index = if len == 1 {
        0
    } else {
        let rank = (len as f64 * p.clamp(0.0, 1.0)).ceil() as usize;
        rank.saturating_sub(1).min(len - 1)
    };
    Some(sorted[index])
}

/// Priority fee in lamports for a price and limit, rounded up
pub fn priority_fee_lamports(price_micro_lamports: u64, compute_unit_limit: u32) -> u64 {
    let micro = u128::from(price_micro_lamports) * u128::from(compute_unit_limit);
    let lamports = micro.div_ceil(MICRO_LAMPORTS_PER_LAMPORT);
    u64::try_from(lamports).unwrap_or(u64::MAX)
}

/// Compute-unit price chosen for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub tier: FeeTier,
    /// Micro-lamports per compute unit
    pub price_micro_lamports: u64,
    /// Non-zero samples the percentile was taken over
    pub sample_count: usize,
    /// True when the sample query failed or returned nothing usable
    pub fallback: bool,
}

/// Total fee for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    pub quote: PriceQuote,
    pub compute_unit_limit: u32,
    pub signatures: usize,
    pub base_fee_lamports: u64,
    pub priority_fee_lamports: u64,
    pub total_lamports: u64,
}

impl FeeEstimate {
    pub fn new(quote: PriceQuote, compute_unit_limit: u32, signatures: usize) -> Self {
        let base_fee_lamports = LAMPORTS_PER_SIGNATURE.saturating_mul(signatures as u64);
        let priority = priority_fee_lamports(quote.price_micro_lamports, compute_unit_limit);
        Self {
            quote,
            compute_unit_limit,
            signatures,
            base_fee_lamports,
            priority_fee_lamports: priority,
            total_lamports: base_fee_lamports.saturating_add(priority),
        }
    }

    pub fn total_sol(&self) -> f64 {
        lamports_to_sol(self.total_lamports)
    }
}

/// Percentile-based fee estimator
#[derive(Debug, Clone)]
pub struct FeeService {
    config: FeeConfig,
}

impl FeeService {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    pub fn compute_unit_limit(&self) -> u32 {
        self.config.compute_unit_limit
    }

    /// Price for a tier from raw samples; `None` when no sample is non-zero
    pub fn price_from_samples(&self, samples: &[u64], tier: FeeTier) -> Option<u64> {
        let non_zero: Vec<u64> = samples.iter().copied().filter(|&f| f > 0).collect();
        let raw = percentile(&non_zero, tier.percentile())?;
        Some(
            raw.max(self.config.minimum_for(tier))
                .min(self.config.max_micro_lamports),
        )
    }

    /// Sample recent fees and quote a price; never fails
    pub async fn quote(&self, rpc: &dyn ChainRpc, accounts: &[Pubkey], tier: FeeTier) -> PriceQuote {
        let fallback = PriceQuote {
            tier,
            price_micro_lamports: self.config.fallback_micro_lamports,
            sample_count: 0,
            fallback: true,
        };

        let samples = match rpc.get_recent_prioritization_fees(accounts).await {
            Ok(samples) => samples,
            Err(e) => {
                metrics().fee_sample_fallbacks.inc();
                warn!(error = %e, tier = %tier, "Fee sample query failed, using fallback price");
                return fallback;
            }
        };

        match self.price_from_samples(&samples, tier) {
            Some(price) => {
                let sample_count = samples.iter().filter(|&&f| f > 0).count();
                debug!(
                    tier = %tier,
                    price_micro_lamports = price,
                    num_fees = samples.len(),
                    non_zero = sample_count,
                    "Priority fee calculation"
                );
                PriceQuote {
                    tier,
                    price_micro_lamports: price,
                    sample_count,
                    fallback: false,
                }
            }
            None => {
                metrics().fee_sample_fallbacks.inc();
                debug!(tier = %tier, num_fees = samples.len(), "No non-zero fee samples, using fallback price");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainRpc;

    fn service() -> FeeService {
        FeeService::new(FeeConfig::default())
    }

    #[test]
    fn test_nearest_rank_percentile() {
        let samples = [500, 100, 400, 200, 300];
        assert_eq!(percentile(&samples, 0.25), Some(200));
        assert_eq!(percentile(&samples, 0.50), Some(300));
        assert_eq!(percentile(&samples, 0.75), Some(400));
        assert_eq!(percentile(&samples, 1.0), Some(500));
        assert_eq!(percentile(&[7], 0.9), Some(7));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_tiers_are_ordered() {
        let svc = service();
        let samples = [100, 200, 300, 400, 500];
        let low = svc.price_from_samples(&samples, FeeTier::Low).unwrap();
        let medium = svc.price_from_samples(&samples, FeeTier::Medium).unwrap();
        let high = svc.price_from_samples(&samples, FeeTier::High).unwrap();
        assert!(low <= medium && medium <= high);

        // Above every minimum, the raw percentiles come through untouched
        let big: Vec<u64> = samples.iter().map(|s| s * 1_000).collect();
        assert_eq!(svc.price_from_samples(&big, FeeTier::Low), Some(200_000));
        assert_eq!(svc.price_from_samples(&big, FeeTier::Medium), Some(300_000));
        assert_eq!(svc.price_from_samples(&big, FeeTier::High), Some(400_000));
    }

    #[test]
    fn test_zero_samples_are_ignored_and_clamped() {
        let svc = service();
        assert_eq!(svc.price_from_samples(&[0, 0, 0], FeeTier::Medium), None);
        assert_eq!(
            svc.price_from_samples(&[0, 0, 1], FeeTier::High),
            Some(svc.config().minimum_for(FeeTier::High))
        );
        assert_eq!(
            svc.price_from_samples(&[u64::MAX], FeeTier::Low),
            Some(svc.config().max_micro_lamports)
        );
    }

    #[test]
    fn test_fee_estimate_rounds_up() {
        assert_eq!(priority_fee_lamports(1, 200_000), 1);
        assert_eq!(priority_fee_lamports(10_000, 200_000), 2_000);
        assert_eq!(priority_fee_lamports(3, 1), 1);
        assert_eq!(priority_fee_lamports(0, 200_000), 0);

        let quote = PriceQuote {
            tier: FeeTier::Medium,
            price_micro_lamports: 10_000,
            sample_count: 5,
            fallback: false,
        };
        let estimate = FeeEstimate::new(quote, 200_000, 2);
        assert_eq!(estimate.base_fee_lamports, 10_000);
        assert_eq!(estimate.total_lamports, 12_000);
        assert!((estimate.total_sol() - 0.000012).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_quote_falls_back_on_query_failure() {
        let rpc = MockChainRpc::new("mock");
        rpc.set_fees_failing(true);
        let svc = service();
        let quote = svc.quote(&rpc, &[], FeeTier::High).await;
        assert!(quote.fallback);
        assert_eq!(quote.price_micro_lamports, svc.config().fallback_micro_lamports);
    }

    #[tokio::test]
    async fn test_quote_from_samples() {
        let rpc = MockChainRpc::new("mock");
        rpc.set_fees(vec![0, 20_000, 40_000, 60_000, 80_000]);
        let quote = service().quote(&rpc, &[], FeeTier::Medium).await;
        assert!(!quote.fallback);
        assert_eq!(quote.sample_count, 4);
        assert_eq!(quote.price_micro_lamports, 40_000);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("HIGH".parse::<FeeTier>(), Ok(FeeTier::High));
        assert!("urgent".parse::<FeeTier>().is_err());
        assert_eq!(FeeTier::default(), FeeTier::Medium);
    }
}
