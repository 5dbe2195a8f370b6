//! Reference impact computations
//!
//! Every computation here implements
//! [`RegionComputation`](rimpacts_core::computation::RegionComputation) and can
//! be composed with the combinators of `rimpacts_core`. The crate provides
//! response curves (fixed or adapting year by year), curves applied to daily
//! weather, growing-season means from a crop calendar, and the replay of
//! results stored by an earlier pass.

pub mod components;
