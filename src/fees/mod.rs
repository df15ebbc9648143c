//! Selling fee computation.
//!
//! Pure decimal arithmetic over a [`FeeSchedule`]. The only failure is a result outside the decimal range.

pub mod calculator;
pub mod schedule;

pub use calculator::FeeInput;
pub use schedule::{
    default_weight_kg, FeeSchedule, MarketFees, MerchantShipping, NetworkRates, SizeTier,
};
