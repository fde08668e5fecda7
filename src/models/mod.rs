//! Core data models for the Hive API.

mod epoch;
mod game;
mod meta;
mod player;
mod stats;

pub use epoch::*;
pub use game::*;
pub use meta::*;
pub use player::*;
pub use stats::*;
