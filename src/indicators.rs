//! Market Indicator Tracker
//!
//! Append-only price history annotated with a running moving average, an
//! exponential moving average and the relative EMA/MA gap that the
//! sentiment-driven strategy reads.
//!
//! ## Recurrences
//! - `ma[i] = (i * ma[i-1] + price[i]) / (i + 1)`
//! - `ema[0] = price[0]`, `ema[i] = 0.05 * price[i] + 0.95 * ema[i-1]`
//! - `sentiment_ratio[i] = (ema[i] - ma[i]) / ma[i]` (0 for the first record)

use serde::Serialize;

use crate::error::{Error, Result};

/// Smoothing factor of the exponential moving average.
pub const EMA_ALPHA: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IndicatorRecord {
    pub tick: usize,
    pub price: f64,
    pub moving_average: f64,
    pub exponential_moving_average: f64,
    /// `(ema - ma) / ma`. NaN when the moving average is zero.
    pub sentiment_ratio: f64,
}

/// One tracker per simulated market.
#[derive(Clone, Debug, Default)]
pub struct IndicatorTracker {
    records: Vec<IndicatorRecord>,
}

impl IndicatorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_price(price: f64) -> Result<Self> {
        let mut tracker = Self::new();
        tracker.record(price)?;
        Ok(tracker)
    }

    pub fn record(&mut self, price: f64) -> Result<&IndicatorRecord> {
        if !(price >= 0.0) || !price.is_finite() {
            return Err(Error::invalid(format!(
                "collateral price must be finite and non-negative, got {price}"
            )));
        }

        let tick = self.records.len();
        let record = match self.records.last() {
            None => IndicatorRecord {
                tick,
                price,
                moving_average: price,
                exponential_moving_average: price,
                sentiment_ratio: 0.0,
            },
            Some(prev) => {
                let n = tick as f64;
                let moving_average = (n * prev.moving_average + price) / (n + 1.0);
                let exponential_moving_average =
                    EMA_ALPHA * price + (1.0 - EMA_ALPHA) * prev.exponential_moving_average;
                IndicatorRecord {
                    tick,
                    price,
                    moving_average,
                    exponential_moving_average,
                    sentiment_ratio: (exponential_moving_average - moving_average) / moving_average,
                }
            }
        };

        self.records.push(record);
        Ok(&self.records[tick])
    }

    pub fn latest(&self) -> Option<&IndicatorRecord> {
        self.records.last()
    }

    pub fn all(&self) -> &[IndicatorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
