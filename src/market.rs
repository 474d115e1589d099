//! Market Price Models
//!
//! Produces the per-tick collateral price change. The stochastic model draws
//! an ordinary Gaussian change rate each tick and, when market stress is
//! enabled, occasionally switches to a shock regime governed by a Poisson
//! rare-event process.
//!
//! ## Models
//! - `MarketModel`: Normal(0, 0.05) change rate, Poisson(λ) shock events with
//!   a Normal(0, 0.5) rate truncated to `0.1 <= |rate| <= 0.85`
//! - `FixedStepModel`: price moves up or down by a fixed fraction each tick
//!
//! ## Draw Pattern
//! Per tick: one Poisson draw (stress enabled and λ > 0 only), then either one
//! ordinary Normal draw or a run of shock draws. `ShockSampling::SingleDraw`
//! redraws one candidate at a time until it lands in the band;
//! `ShockSampling::Pooled` draws `pool_size` candidates per round and picks
//! uniformly among the accepted ones.
//!
//! Neither model validates the resulting price. `Position::update_price` is
//! where negative prices are rejected.

use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ShockSampling {
    #[default]
    SingleDraw,
    Pooled { pool_size: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub volatility: f64,       // Ordinary per-tick change-rate std dev
    pub shock_volatility: f64, // Shock change-rate std dev before truncation
    pub min_shock_rate: f64,   // Smallest accepted |shock rate|
    pub max_shock_rate: f64,   // Largest accepted |shock rate|
    pub shock_sampling: ShockSampling,
    pub max_shock_draws: usize, // Safety cap on candidate draws per shock
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            volatility: 0.05,
            shock_volatility: 0.5,
            min_shock_rate: 0.1,
            max_shock_rate: 0.85,
            shock_sampling: ShockSampling::SingleDraw,
            max_shock_draws: 10_000,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.volatility.is_finite() && self.volatility >= 0.0) {
            return Err(Error::invalid(format!(
                "volatility must be finite and non-negative, got {}",
                self.volatility
            )));
        }
        if !(self.shock_volatility.is_finite() && self.shock_volatility > 0.0) {
            return Err(Error::invalid(format!(
                "shock volatility must be finite and positive, got {}",
                self.shock_volatility
            )));
        }
        let band_ok = self.min_shock_rate.is_finite()
            && self.max_shock_rate.is_finite()
            && self.min_shock_rate >= 0.0
            && self.min_shock_rate <= self.max_shock_rate;
        if !band_ok {
            return Err(Error::invalid(format!(
                "shock band must satisfy 0 <= min <= max, got [{}, {}]",
                self.min_shock_rate, self.max_shock_rate
            )));
        }
        if let ShockSampling::Pooled { pool_size: 0 } = self.shock_sampling {
            return Err(Error::invalid("shock sampling pool must not be empty"));
        }
        if self.max_shock_draws == 0 {
            return Err(Error::invalid("max shock draws must be at least 1"));
        }
        Ok(())
    }

    fn accepts_shock(&self, rate: f64) -> bool {
        let magnitude = rate.abs();
        self.min_shock_rate <= magnitude && magnitude <= self.max_shock_rate
    }
}

/// Signed price change for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceChange {
    pub previous_price: f64,
    pub rate: f64,
    pub delta: f64,
    pub shock: bool,
}

impl PriceChange {
    fn from_rate(previous_price: f64, rate: f64, shock: bool) -> Self {
        Self {
            previous_price,
            rate,
            delta: rate * previous_price,
            shock,
        }
    }

    pub fn new_price(&self) -> f64 {
        self.previous_price + self.delta
    }

    pub fn is_negative_shock(&self) -> bool {
        self.shock && self.rate < 0.0
    }
}

/// Rare-event process: each tick an event occurs when a Poisson(λ) draw is
/// non-zero, i.e. with probability `1 - e^-λ`.
#[derive(Clone, Debug)]
pub struct StressProcess {
    rate: f64,
    poisson: Option<Poisson<f64>>,
}

impl StressProcess {
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate >= 0.0) || rate.is_infinite() {
            return Err(Error::invalid(format!(
                "average event frequency per tick must be finite and non-negative, got {rate}"
            )));
        }
        let poisson = if rate > 0.0 {
            let dist = Poisson::new(rate)
                .map_err(|e| Error::invalid(format!("stress rate {rate}: {e}")))?;
            Some(dist)
        } else {
            None
        };
        Ok(Self { rate, poisson })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn event_occurs(&self, rng: &mut impl Rng) -> bool {
        match &self.poisson {
            Some(poisson) => poisson.sample(rng) > 0.0,
            None => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MarketModel {
    stress_enabled: bool,
    stress: StressProcess,
    config: MarketConfig,
    ordinary: Normal<f64>,
    shock: Normal<f64>,
}

impl MarketModel {
    pub fn new(stress_enabled: bool, stress_rate: f64) -> Result<Self> {
        Self::with_config(stress_enabled, stress_rate, MarketConfig::default())
    }

    pub fn with_config(stress_enabled: bool, stress_rate: f64, config: MarketConfig) -> Result<Self> {
        config.validate()?;
        let stress = StressProcess::new(stress_rate)?;
        let ordinary = Normal::new(0.0, config.volatility)
            .map_err(|e| Error::invalid(format!("volatility: {e}")))?;
        let shock = Normal::new(0.0, config.shock_volatility)
            .map_err(|e| Error::invalid(format!("shock volatility: {e}")))?;

        Ok(Self {
            stress_enabled,
            stress,
            config,
            ordinary,
            shock,
        })
    }

    pub fn stress_enabled(&self) -> bool {
        self.stress_enabled
    }

    pub fn stress_rate(&self) -> f64 {
        self.stress.rate()
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn next_price_change(&self, previous_price: f64, rng: &mut impl Rng) -> Result<PriceChange> {
        if self.stress_enabled && self.stress.event_occurs(rng) {
            let rate = self.shock_rate(rng)?;
            debug!(previous_price, rate, "market shock");
            return Ok(PriceChange::from_rate(previous_price, rate, true));
        }

        let rate = self.ordinary.sample(rng);
        Ok(PriceChange::from_rate(previous_price, rate, false))
    }

    fn shock_rate(&self, rng: &mut impl Rng) -> Result<f64> {
        let cap = self.config.max_shock_draws;
        match self.config.shock_sampling {
            ShockSampling::SingleDraw => {
                for _ in 0..cap {
                    let candidate = self.shock.sample(rng);
                    if self.config.accepts_shock(candidate) {
                        return Ok(candidate);
                    }
                }
                Err(Error::SamplingExhausted { attempts: cap })
            }
            ShockSampling::Pooled { pool_size } => {
                let mut attempts = 0;
                let mut accepted = Vec::with_capacity(pool_size);
                while attempts < cap {
                    let round = pool_size.min(cap - attempts);
                    attempts += round;
                    accepted.clear();
                    for _ in 0..round {
                        let candidate = self.shock.sample(rng);
                        if self.config.accepts_shock(candidate) {
                            accepted.push(candidate);
                        }
                    }
                    if !accepted.is_empty() {
                        return Ok(accepted[rng.gen_range(0..accepted.len())]);
                    }
                }
                Err(Error::SamplingExhausted { attempts })
            }
        }
    }
}

/// Price moves by `±rate * previous_price` with equal probability each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStepModel {
    rate: f64,
}

impl FixedStepModel {
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate >= 0.0) {
            return Err(Error::invalid(format!(
                "price change rate must not be negative, got {rate}"
            )));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn next_price_change(&self, previous_price: f64, rng: &mut impl Rng) -> PriceChange {
        let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        PriceChange::from_rate(previous_price, direction * self.rate, false)
    }
}
