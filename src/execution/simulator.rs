//! Slippage model and fill simulation
//!
//! Slippage (bps) is the sum of four independent terms:
//!
//! - half the quoted spread
//! - size impact, `amount × 0.5`, capped at 50 bps
//! - volatility impact, `volatility_1h × 2`, capped at 30 bps
//! - uniform noise on `[-noise_bps, +noise_bps]`
//!
//! The total is floored at zero and rounded to two decimals. Buys fill at
//! `best_ask × (1 + slippage / 10000)`, sells at `best_bid × (1 - slippage / 10000)`.

use super::{Fill, Side};
use crate::market::MarketSnapshot;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SIZE_IMPACT_CAP_BPS: Decimal = dec!(50);
const VOLATILITY_IMPACT_CAP_BPS: Decimal = dec!(30);
const BPS: Decimal = dec!(10000);

/// Random source for the noise term
pub trait NoiseSource: Send + Sync {
    /// Sample uniformly from `[low, high]`
    fn sample(&self, low: f64, high: f64) -> f64;
}

/// Production noise backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngNoise;

impl NoiseSource for ThreadRngNoise {
    fn sample(&self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Noise pinned to a constant, clamped into the requested range
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f64);

impl NoiseSource for FixedNoise {
    fn sample(&self, low: f64, high: f64) -> f64 {
        self.0.clamp(low, high)
    }
}

/// Turns a market snapshot into a realistic fill
pub struct ExecutionSimulator {
    noise_bps: Decimal,
    noise: Box<dyn NoiseSource>,
}

impl ExecutionSimulator {
    /// Create a simulator with `±noise_bps` uniform noise
    pub fn new(noise_bps: Decimal, noise: Box<dyn NoiseSource>) -> Self {
        Self {
            noise_bps: noise_bps.abs(),
            noise,
        }
    }

    /// Slippage in bps for an order of `amount` against `snapshot`
    pub fn slippage_bps(&self, snapshot: &MarketSnapshot, amount: Decimal) -> Decimal {
        let spread_cost = snapshot.spread_bps.max(Decimal::ZERO) / Decimal::TWO;
        let size_impact = (amount.abs() * dec!(0.5)).min(SIZE_IMPACT_CAP_BPS);
        let volatility_impact = (snapshot.volatility_1h.max(Decimal::ZERO) * Decimal::TWO)
            .min(VOLATILITY_IMPACT_CAP_BPS);

        let half_width: f64 = self.noise_bps.try_into().unwrap_or(0.0);
        let noise = Decimal::try_from(self.noise.sample(-half_width, half_width))
            .unwrap_or(Decimal::ZERO);

        (spread_cost + size_impact + volatility_impact + noise)
            .max(Decimal::ZERO)
            .round_dp(2)
    }

    /// Simulate a market fill on `side` for `amount`
    pub fn simulate_fill(&self, snapshot: &MarketSnapshot, side: Side, amount: Decimal) -> Fill {
        let slippage_bps = self.slippage_bps(snapshot, amount);
        let factor = slippage_bps / BPS;
        let execution_price = match side {
            Side::Buy => snapshot.best_ask * (Decimal::ONE + factor),
            Side::Sell => snapshot.best_bid * (Decimal::ONE - factor),
        };

        tracing::trace!(
            symbol = %snapshot.symbol,
            ?side,
            %amount,
            %slippage_bps,
            %execution_price,
            "Simulated fill"
        );

        Fill {
            execution_price,
            slippage_bps,
        }
    }
}

impl Default for ExecutionSimulator {
    fn default() -> Self {
        Self::new(dec!(5), Box::new(ThreadRngNoise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(spread_bps: Decimal, volatility_1h: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "SOL".to_string(),
            best_bid: dec!(99.95),
            best_ask: dec!(100.05),
            mid: dec!(100),
            spread_bps,
            volatility_1h,
            timestamp: Utc::now(),
        }
    }

    fn pinned(noise: f64) -> ExecutionSimulator {
        ExecutionSimulator::new(dec!(5), Box::new(FixedNoise(noise)))
    }

    #[test]
    fn test_slippage_within_bounds_with_real_noise() {
        let sim = ExecutionSimulator::default();
        let snap = snapshot(dec!(10), dec!(5));
        // 10/2 + min(50, 500) + min(30, 10) = 65, noise ±5
        for _ in 0..500 {
            let bps = sim.slippage_bps(&snap, dec!(1000));
            assert!(bps >= dec!(60) && bps <= dec!(70), "slippage {bps} out of range");
        }
    }

    #[test]
    fn test_slippage_caps() {
        let sim = pinned(0.0);
        // size impact capped at 50, volatility impact capped at 30
        let bps = sim.slippage_bps(&snapshot(dec!(0), dec!(1000)), dec!(1_000_000));
        assert_eq!(bps, dec!(80));
    }

    #[test]
    fn test_slippage_small_order() {
        let sim = pinned(0.0);
        // 10/2 + 2*0.5 + 1*2 = 8
        let bps = sim.slippage_bps(&snapshot(dec!(10), dec!(1)), dec!(2));
        assert_eq!(bps, dec!(8));
    }

    #[test]
    fn test_slippage_never_negative() {
        let sim = pinned(-5.0);
        let bps = sim.slippage_bps(&snapshot(dec!(0), dec!(0)), dec!(1));
        assert_eq!(bps, dec!(0));
    }

    #[test]
    fn test_fixed_noise_is_clamped() {
        let sim = pinned(100.0);
        let bps = sim.slippage_bps(&snapshot(dec!(0), dec!(0)), dec!(0));
        assert_eq!(bps, dec!(5));
    }

    #[test]
    fn test_buy_fills_above_ask() {
        let sim = pinned(0.0);
        let fill = sim.simulate_fill(&snapshot(dec!(10), dec!(0)), Side::Buy, dec!(10));
        // 5 + 5 = 10 bps on 100.05
        assert_eq!(fill.slippage_bps, dec!(10));
        assert_eq!(fill.execution_price, dec!(100.05) * dec!(1.001));
    }

    #[test]
    fn test_sell_fills_below_bid() {
        let sim = pinned(0.0);
        let fill = sim.simulate_fill(&snapshot(dec!(10), dec!(0)), Side::Sell, dec!(10));
        assert_eq!(fill.execution_price, dec!(99.95) * dec!(0.999));
    }
}
