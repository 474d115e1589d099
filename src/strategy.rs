//! Position Management Policies
//!
//! Seven strategies an agent can follow to resize its vault each tick. Each
//! one reads a snapshot of the position and the latest indicator record and
//! proposes at most one `(delta_collateral, delta_loan)` adjustment, which the
//! position then re-validates.
//!
//! Notation: `m` = min collateral ratio, `lb` = liquidation buffer,
//! `vb` = volatility buffer.
//!
//! ## Strategies
//! - Passive: hands-off
//! - Active: borrows a random share of the surplus over `lb = 0.5 * vb`, then
//!   resizes collateral so the position lands on that target
//! - SentimentDriven: borrows into bullish markets, repays in bearish ones
//! - Random: half the ticks, a random collateral move and loan target
//! - SimpleColl: keeps `lb` within `[0.5, 1] * vb` through 5% collateral moves
//! - SimpleLoan: borrows or repays so that `lb = 0.5 * vb`
//! - Traditional: restores `lb = vb` through collateral once it leaves
//!   `[0.75, 1.25] * vb`
//!
//! ## Randomness
//! Every draw is fresh per call and there is no strategy state. Active: one
//! `U(0,1)`. SentimentDriven bullish: `U(0,1)` then `U(0.5,0.95)`; bearish:
//! one `U(0.75,1)`. Random: one Bernoulli(0.5), then `U(0, 0.8/(m-1))` and
//! `U(-0.1,0.1)`. The other strategies are deterministic.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::indicators::IndicatorRecord;
use crate::position::{Position, PositionSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Passive,
    Active,
    SentimentDriven,
    Random,
    SimpleColl,
    SimpleLoan,
    Traditional,
}

impl Strategy {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Passive,
            Self::Active,
            Self::SentimentDriven,
            Self::Random,
            Self::SimpleColl,
            Self::SimpleLoan,
            Self::Traditional,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Active => "active",
            Self::SentimentDriven => "sentiment_driven",
            Self::Random => "random",
            Self::SimpleColl => "simple_coll",
            Self::SimpleLoan => "simple_loan",
            Self::Traditional => "traditional",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Passive => "Passive (hands-off)",
            Self::Active => "Active (maintains liquidation buffer)",
            Self::SentimentDriven => "Sentiment-Driven (follows the market)",
            Self::Random => "Random",
            Self::SimpleColl => "Simple Collateral Adjustment",
            Self::SimpleLoan => "Simple Loan Adjustment",
            Self::Traditional => "Traditional (risk-averse)",
        }
    }

    /// Compute this tick's adjustment, if any. Returns `None` for liquidated
    /// positions and for proposals that are not finite.
    pub fn propose(
        &self,
        position: &PositionSnapshot,
        indicator: &IndicatorRecord,
        rng: &mut impl Rng,
    ) -> Option<Adjustment> {
        if position.liquidated {
            return None;
        }

        let proposal = match self {
            Self::Passive => None,
            Self::Active => active(position, indicator, rng),
            Self::SentimentDriven => sentiment_driven(position, indicator, rng),
            Self::Random => random(position, indicator, rng),
            Self::SimpleColl => simple_coll(position),
            Self::SimpleLoan => simple_loan(position),
            Self::Traditional => traditional(position, indicator),
        }?;

        if !proposal.is_finite() {
            warn!(strategy = self.name(), ?proposal, "discarding non-finite adjustment");
            return None;
        }
        trace!(strategy = self.name(), ?proposal, "adjustment proposed");
        Some(proposal)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::all()
            .into_iter()
            .find(|strategy| strategy.name() == key)
            .ok_or_else(|| Error::invalid(format!("not a valid strategy: {s:?}")))
    }
}

/// A resize instruction for `Position::resize_loan`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Adjustment {
    pub delta_collateral: f64,
    pub delta_loan: f64,
}

impl Adjustment {
    fn collateral(delta_collateral: f64) -> Self {
        Self {
            delta_collateral,
            delta_loan: 0.0,
        }
    }

    fn loan(delta_loan: f64) -> Self {
        Self {
            delta_collateral: 0.0,
            delta_loan,
        }
    }

    fn is_finite(&self) -> bool {
        self.delta_collateral.is_finite() && self.delta_loan.is_finite()
    }
}

/// Squashes an unbounded indicator into `(-1, 1)`: `x / sqrt(x^2 + 1)`.
pub fn sentiment(x: f64) -> f64 {
    x / (x * x + 1.0).sqrt()
}

/// Loan change that leaves `buffer_ratio` of the ratio-implied margin unborrowed
/// once `delta_collateral` has been added at `price`.
fn loan_delta_for_buffer_ratio(
    position: &PositionSnapshot,
    buffer_ratio: f64,
    delta_collateral: f64,
    price: f64,
) -> f64 {
    let m = position.min_collateral_ratio;
    let collateral_value = position.collateral_value + delta_collateral * price;
    ((1.0 - buffer_ratio * (m - 1.0)) / m) * collateral_value - position.loan_value
}

fn active(p: &PositionSnapshot, indicator: &IndicatorRecord, rng: &mut impl Rng) -> Option<Adjustment> {
    let m = p.min_collateral_ratio;
    let surplus = p.liquidation_buffer - 0.5 * p.volatility_buffer;
    let delta_loan = rng.gen::<f64>() * surplus;
    let target_amount = (2.0 * m / (3.0 - m)) * (p.loan_value + delta_loan) / indicator.price;
    Some(Adjustment {
        delta_collateral: target_amount - p.collateral_amount,
        delta_loan,
    })
}

fn sentiment_driven(
    p: &PositionSnapshot,
    indicator: &IndicatorRecord,
    rng: &mut impl Rng,
) -> Option<Adjustment> {
    let s = sentiment(indicator.sentiment_ratio);

    if s > 0.0 && p.liquidation_buffer > 0.5 * p.volatility_buffer {
        let delta_collateral = rng.gen::<f64>() * s;
        let buffer_ratio = rng.gen_range(0.5..0.95) * (1.0 - s);
        let delta_loan = loan_delta_for_buffer_ratio(p, buffer_ratio, delta_collateral, indicator.price);
        return Some(Adjustment {
            delta_collateral,
            delta_loan,
        });
    }

    if s < 0.0 && p.liquidation_buffer < 0.75 * p.volatility_buffer {
        let share = rng.gen_range(0.75..1.0);
        return Some(Adjustment::loan(p.liquidation_buffer - share * p.volatility_buffer));
    }

    None
}

fn random(p: &PositionSnapshot, indicator: &IndicatorRecord, rng: &mut impl Rng) -> Option<Adjustment> {
    if !rng.gen_bool(0.5) {
        return None;
    }

    let max_buffer_ratio = 0.8 / (p.min_collateral_ratio - 1.0);
    let buffer_ratio = rng.gen_range(0.0..max_buffer_ratio);
    let delta_collateral = rng.gen_range(-0.1..0.1) * p.collateral_amount;
    let delta_loan = loan_delta_for_buffer_ratio(p, buffer_ratio, delta_collateral, indicator.price);
    Some(Adjustment {
        delta_collateral,
        delta_loan,
    })
}

fn simple_coll(p: &PositionSnapshot) -> Option<Adjustment> {
    // One instruction per tick: both bands are checked against the pre-move
    // state, and a move that overshoots the far band waits for the next tick.
    if p.liquidation_buffer < 0.5 * p.volatility_buffer {
        return Some(Adjustment::collateral(0.05 * p.collateral_amount));
    }
    if p.liquidation_buffer > p.volatility_buffer {
        return Some(Adjustment::collateral(-0.05 * p.collateral_amount));
    }
    None
}

fn simple_loan(p: &PositionSnapshot) -> Option<Adjustment> {
    let target = 0.5 * p.volatility_buffer;
    if p.liquidation_buffer < target || p.liquidation_buffer > target {
        return Some(Adjustment::loan(p.liquidation_buffer - target));
    }
    None
}

fn traditional(p: &PositionSnapshot, indicator: &IndicatorRecord) -> Option<Adjustment> {
    let lb = p.liquidation_buffer;
    let vb = p.volatility_buffer;
    if lb < 0.75 * vb || lb > 1.25 * vb {
        let m = p.min_collateral_ratio;
        let target_amount = (m / (indicator.price * (2.0 - m))) * p.loan_value;
        return Some(Adjustment::collateral(target_amount - p.collateral_amount));
    }
    None
}

/// One agent's policy. The strategy is fixed for the agent's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyEngine {
    strategy: Strategy,
}

impl PolicyEngine {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Propose and submit this tick's adjustment.
    ///
    /// Returns the submitted instruction. The position may still refuse it;
    /// compare its state before and after to tell.
    pub fn apply(
        &self,
        position: &mut Position,
        indicator: &IndicatorRecord,
        rng: &mut impl Rng,
    ) -> Result<Option<Adjustment>> {
        if position.is_liquidated() {
            return Ok(None);
        }
        let Some(adjustment) = self.strategy.propose(&position.snapshot(), indicator, rng) else {
            return Ok(None);
        };
        position.resize_loan(adjustment.delta_collateral, adjustment.delta_loan)?;
        Ok(Some(adjustment))
    }
}
