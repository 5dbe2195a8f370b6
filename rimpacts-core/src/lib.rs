//! Streaming per-region impact computations
//!
//! A [`computation::RegionComputation`] turns one region's daily weather into a
//! lazy stream of yearly results. The [`combinators`] compose computations, the
//! [`driver::Driver`] runs one over every region of a [`weather::WeatherSource`]
//! into a [`bundle::ResultSink`], and the [`aggregate::Aggregator`] folds the
//! written results into coarser regions.

pub mod aggregate;
pub mod bundle;
pub mod calendar;
pub mod combinators;
pub mod computation;
pub mod config;
pub mod driver;
pub mod grouping;
pub mod region;
pub mod result;
pub mod weather;
pub mod weights;

pub mod errors;
