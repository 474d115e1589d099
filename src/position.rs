//! Collateralized Loan Position
//!
//! A single vault: collateral held against an outstanding loan, subject to a
//! minimum collateral ratio for its whole lifetime.
//!
//! ## State Machine
//! - `Active`: `collateral_value >= min_collateral_ratio * loan_value` holds.
//! - `Liquidated`: terminal. Entered only from a price update that breaks the
//!   ratio. Every later mutation request is a no-op.
//!
//! ## Buffers
//! - Liquidation buffer: value that can still be borrowed before the ratio binds.
//! - Volatility buffer: the remaining cushion above the loan, so that
//!   `liquidation_buffer + volatility_buffer + loan_value == collateral_value`.
//!
//! Loan resizes value collateral at the last recorded price, never a fresh
//! market read. A resize that would break the ratio is refused without error.

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Active,
    Liquidated,
}

/// Read-only view of a position for strategies and reporting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub state: PositionState,
    pub collateral_amount: f64,
    pub collateral_value: f64,
    pub loan_value: f64,
    pub min_collateral_ratio: f64,
    pub liquidation_buffer: f64,
    pub volatility_buffer: f64,
    pub liquidated: bool,
    pub liquidated_value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    collateral_amount: f64,
    latest_price: f64,
    collateral_value: f64,
    loan_value: f64,
    min_collateral_ratio: f64,
    liquidation_buffer: f64,
    volatility_buffer: f64,
    liquidated: bool,
    liquidated_value: f64,
}

impl Position {
    pub fn new(
        collateral_price: f64,
        collateral_amount: f64,
        min_collateral_ratio: f64,
        loan_value: f64,
    ) -> Result<Self> {
        if !is_quantity(collateral_price) || !is_quantity(collateral_amount) || !is_quantity(loan_value) {
            return Err(Error::invalid(format!(
                "price ({collateral_price}), collateral amount ({collateral_amount}) \
                 and loan value ({loan_value}) must be finite and non-negative"
            )));
        }
        if !(min_collateral_ratio > 1.0) || !min_collateral_ratio.is_finite() {
            return Err(Error::invalid(format!(
                "min collateral ratio must be finite and greater than 1, got {min_collateral_ratio}"
            )));
        }

        let collateral_value = collateral_amount * collateral_price;
        let required_value = min_collateral_ratio * loan_value;
        if collateral_value < required_value {
            return Err(Error::InvariantViolationAtCreation {
                collateral_value,
                required_value,
            });
        }

        let mut position = Self {
            collateral_amount,
            latest_price: collateral_price,
            collateral_value,
            loan_value,
            min_collateral_ratio,
            liquidation_buffer: 0.0,
            volatility_buffer: 0.0,
            liquidated: false,
            liquidated_value: 0.0,
        };
        position.refresh_buffers();
        Ok(position)
    }

    pub fn collateral_amount(&self) -> f64 {
        self.collateral_amount
    }

    pub fn collateral_value(&self) -> f64 {
        self.collateral_value
    }

    pub fn loan_value(&self) -> f64 {
        self.loan_value
    }

    pub fn min_collateral_ratio(&self) -> f64 {
        self.min_collateral_ratio
    }

    pub fn liquidation_buffer(&self) -> f64 {
        self.liquidation_buffer
    }

    pub fn volatility_buffer(&self) -> f64 {
        self.volatility_buffer
    }

    pub fn is_liquidated(&self) -> bool {
        self.liquidated
    }

    /// Collateral value minus loan at the moment of liquidation. Negative
    /// values are realized bad debt. Zero while active.
    pub fn liquidated_value(&self) -> f64 {
        self.liquidated_value
    }

    pub fn state(&self) -> PositionState {
        if self.liquidated {
            PositionState::Liquidated
        } else {
            PositionState::Active
        }
    }

    /// Current collateral value over loan value; infinite for a debt-free position.
    pub fn collateral_ratio(&self) -> f64 {
        if self.loan_value == 0.0 {
            return f64::INFINITY;
        }
        self.collateral_value / self.loan_value
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            state: self.state(),
            collateral_amount: self.collateral_amount,
            collateral_value: self.collateral_value,
            loan_value: self.loan_value,
            min_collateral_ratio: self.min_collateral_ratio,
            liquidation_buffer: self.liquidation_buffer,
            volatility_buffer: self.volatility_buffer,
            liquidated: self.liquidated,
            liquidated_value: self.liquidated_value,
        }
    }

    /// Revalue the collateral at a new market price, liquidating the position
    /// if the ratio no longer holds.
    pub fn update_price(&mut self, new_price: f64) -> Result<()> {
        if !is_quantity(new_price) {
            return Err(Error::invalid(format!(
                "collateral price must be finite and non-negative, got {new_price}"
            )));
        }
        if self.liquidated {
            return Ok(());
        }

        let updated_value = self.collateral_amount * new_price;
        if updated_value >= self.min_collateral_ratio * self.loan_value {
            self.latest_price = new_price;
            self.collateral_value = updated_value;
            self.refresh_buffers();
        } else {
            self.liquidate(updated_value);
        }
        Ok(())
    }

    /// Add (or withdraw) collateral and borrow (or repay) in one step.
    ///
    /// Fails if the result would hold a negative amount of either. A resize
    /// that would break the ratio leaves the position untouched.
    pub fn resize_loan(&mut self, delta_collateral: f64, delta_loan: f64) -> Result<()> {
        if self.liquidated {
            return Ok(());
        }

        let updated_amount = self.collateral_amount + delta_collateral;
        let updated_loan = self.loan_value + delta_loan;
        if !is_quantity(updated_amount) || !is_quantity(updated_loan) {
            return Err(Error::invalid(format!(
                "cannot take more from the position than it holds \
                 (collateral {updated_amount}, loan {updated_loan})"
            )));
        }

        let updated_value = updated_amount * self.latest_price;
        if updated_value < self.min_collateral_ratio * updated_loan {
            trace!(
                delta_collateral,
                delta_loan,
                updated_value,
                updated_loan,
                "resize refused: would breach min collateral ratio"
            );
            return Ok(());
        }

        self.collateral_amount = updated_amount;
        self.loan_value = updated_loan;
        self.collateral_value = updated_value;
        self.refresh_buffers();
        Ok(())
    }

    fn liquidate(&mut self, value_at_trigger: f64) {
        self.liquidated_value = value_at_trigger - self.loan_value;
        self.collateral_amount = 0.0;
        self.collateral_value = 0.0;
        self.liquidation_buffer = 0.0;
        self.volatility_buffer = 0.0;
        self.liquidated = true;
        debug!(
            value_at_trigger,
            loan_value = self.loan_value,
            liquidated_value = self.liquidated_value,
            "position liquidated"
        );
    }

    fn refresh_buffers(&mut self) {
        self.liquidation_buffer = self.collateral_value / self.min_collateral_ratio - self.loan_value;
        self.volatility_buffer = self.collateral_value - self.liquidation_buffer - self.loan_value;
    }
}

/// Finite and non-negative; NaN fails both.
fn is_quantity(x: f64) -> bool {
    x >= 0.0 && x.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position::new(2.0, 10.0, 1.5, 10.0).unwrap()
    }

    #[test]
    fn test_new_position_buffers() {
        let p = sample_position();

        assert_eq!(p.state(), PositionState::Active);
        assert!((p.collateral_value() - 20.0).abs() < 1e-12);
        assert!((p.liquidation_buffer() - (20.0 / 1.5 - 10.0)).abs() < 1e-12);
        let sum = p.liquidation_buffer() + p.volatility_buffer() + p.loan_value();
        assert!((sum - p.collateral_value()).abs() < 1e-9);
        assert!((p.collateral_ratio() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        assert!(matches!(Position::new(-1.0, 1.0, 1.5, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, -1.0, 1.5, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, 1.0, 1.5, -1.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, 1.0, 1.0, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, 1.0, 0.5, 0.0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_non_finite_ratio() {
        assert!(matches!(Position::new(1.0, 10.0, f64::INFINITY, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, 10.0, f64::NAN, 0.0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_non_finite_inputs() {
        let inf = f64::INFINITY;
        assert!(matches!(Position::new(inf, 1.0, 1.5, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, inf, 1.5, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(1.0, inf, 1.5, inf), Err(Error::InvalidInput(_))));
        assert!(matches!(Position::new(f64::NAN, 1.0, 1.5, 0.0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_undercollateralized_state() {
        let err = Position::new(100.0, 1.0, 2.0, 60.0).unwrap_err();
        assert_eq!(
            err,
            Error::InvariantViolationAtCreation {
                collateral_value: 100.0,
                required_value: 120.0,
            }
        );
    }

    #[test]
    fn test_price_drop_liquidates() {
        let mut p = sample_position();
        p.update_price(1.0).unwrap();

        assert!(p.is_liquidated());
        assert_eq!(p.state(), PositionState::Liquidated);
        assert_eq!(p.liquidated_value(), 0.0);
        assert_eq!(p.collateral_amount(), 0.0);
        assert_eq!(p.collateral_value(), 0.0);
        assert_eq!(p.liquidation_buffer(), 0.0);
        assert_eq!(p.volatility_buffer(), 0.0);
    }

    #[test]
    fn test_liquidation_records_bad_debt() {
        let mut p = sample_position();
        p.update_price(0.5).unwrap();

        assert!(p.is_liquidated());
        assert!((p.liquidated_value() - (5.0 - 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_solvent_price_update_revalues() {
        let mut p = sample_position();
        p.update_price(1.5).unwrap();

        assert!(!p.is_liquidated());
        assert!((p.collateral_value() - 15.0).abs() < 1e-12);
        assert!(p.liquidation_buffer().abs() < 1e-12);
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut p = sample_position();
        let before = p.clone();

        assert!(matches!(p.update_price(-0.1), Err(Error::InvalidInput(_))));
        assert_eq!(p, before);
    }

    #[test]
    fn test_infinite_price_rejected() {
        let mut p = Position::new(1.0, 10.0, 1.5, 5.0).unwrap();
        let before = p.clone();

        assert!(matches!(p.update_price(f64::INFINITY), Err(Error::InvalidInput(_))));
        assert!(matches!(p.update_price(f64::NAN), Err(Error::InvalidInput(_))));
        assert_eq!(p, before);
        assert_eq!(p.state(), PositionState::Active);
    }

    #[test]
    fn test_liquidated_position_is_inert() {
        let mut p = sample_position();
        p.update_price(1.0).unwrap();
        let frozen = p.snapshot();

        p.update_price(100.0).unwrap();
        p.resize_loan(5.0, -5.0).unwrap();
        p.resize_loan(-100.0, -100.0).unwrap();

        assert_eq!(p.snapshot(), frozen);
    }

    #[test]
    fn test_resize_commits_when_ratio_holds() {
        let mut p = sample_position();
        p.resize_loan(5.0, 5.0).unwrap();

        assert!((p.collateral_amount() - 15.0).abs() < 1e-12);
        assert!((p.loan_value() - 15.0).abs() < 1e-12);
        assert!((p.collateral_value() - 30.0).abs() < 1e-12);
        assert!((p.liquidation_buffer() - (30.0 / 1.5 - 15.0)).abs() < 1e-12);
    }

    #[test]
    fn test_resize_refused_when_ratio_breaks() {
        let mut p = sample_position();
        let before = p.clone();

        // 20 / 14 < 1.5
        p.resize_loan(0.0, 4.0).unwrap();

        assert_eq!(p, before);
    }

    #[test]
    fn test_resize_overdraw_is_error() {
        let mut p = sample_position();

        assert!(matches!(p.resize_loan(-11.0, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(p.resize_loan(0.0, -11.0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_resize_to_infinite_amounts_is_error() {
        let mut p = sample_position();
        let before = p.clone();

        assert!(matches!(p.resize_loan(f64::INFINITY, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(p.resize_loan(0.0, f64::INFINITY), Err(Error::InvalidInput(_))));
        assert!(matches!(p.resize_loan(f64::NAN, 1.0), Err(Error::InvalidInput(_))));
        assert_eq!(p, before);
    }

    #[test]
    fn test_resize_uses_last_recorded_price() {
        let mut p = sample_position();
        p.update_price(3.0).unwrap();

        // valued at 3.0: 12 * 3 = 36 >= 1.5 * 24
        p.resize_loan(2.0, 14.0).unwrap();

        assert!((p.collateral_value() - 36.0).abs() < 1e-12);
        assert!((p.loan_value() - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_debt_free_ratio_is_infinite() {
        let p = Position::new(10.0, 1.0, 1.5, 0.0).unwrap();
        assert!(p.collateral_ratio().is_infinite());
    }
}
