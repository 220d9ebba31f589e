pub mod backtest;
pub mod config;
pub mod features;
pub mod filters;
pub mod frequency;
pub mod matching;
pub mod patterns;
pub mod watchlist;
