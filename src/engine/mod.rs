//! Core engine: opportunity calculation, slippage, and the refresh cycle.

pub mod calculator;
pub mod refresher;
pub mod slippage;

pub use calculator::{CostModel, OpportunityEngine};
pub use refresher::{CycleSummary, RefreshSettings, Refresher};
