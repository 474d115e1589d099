//! Vault Liquidation Simulation Kernel
//!
//! Building blocks for Monte Carlo studies of how position-management
//! policies affect liquidation frequency and capital efficiency of
//! collateralized loans.
//!
//! ## Modules
//!
//! - `position`: the vault and its liquidation state machine
//! - `strategy`: the seven position-management policies
//! - `market`: price change models with an optional shock regime
//! - `indicators`: moving averages and sentiment derived from the price history
//! - `rng`: reproducible per-market and per-agent random streams
//!
//! ## Tick Order
//!
//! The driver owns the loop. Each tick: draw a price change from the market
//! model, record the new price in the indicator tracker, push it to every
//! position, then let each surviving position's policy engine resize it.
//!
//! ```
//! use vault_simulation::{IndicatorTracker, MarketModel, PolicyEngine, Position, RngStreams, Strategy};
//!
//! let streams = RngStreams::new(7);
//! let mut market_rng = streams.market(0);
//! let mut agent_rng = streams.agent(0);
//!
//! let market = MarketModel::new(true, 0.01)?;
//! let mut tracker = IndicatorTracker::with_initial_price(2000.0)?;
//! let mut position = Position::new(2000.0, 1.0, 1.5, 1000.0)?;
//! let engine = PolicyEngine::new(Strategy::SimpleLoan);
//!
//! let mut price = 2000.0;
//! for _ in 0..100 {
//!     price = market.next_price_change(price, &mut market_rng)?.new_price().max(0.0);
//!     let indicator = *tracker.record(price)?;
//!     position.update_price(price)?;
//!     engine.apply(&mut position, &indicator, &mut agent_rng)?;
//! }
//! # Ok::<(), vault_simulation::Error>(())
//! ```

pub mod error;
pub mod indicators;
pub mod market;
pub mod position;
pub mod rng;
pub mod strategy;

pub use error::{Error, Result};
pub use indicators::{IndicatorRecord, IndicatorTracker};
pub use market::{FixedStepModel, MarketConfig, MarketModel, PriceChange, ShockSampling, StressProcess};
pub use position::{Position, PositionSnapshot, PositionState};
pub use rng::RngStreams;
pub use strategy::{sentiment, Adjustment, PolicyEngine, Strategy};
