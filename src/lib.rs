//! Four tanks in a cascade, joined by pipes, stepped by a fixed-rate
//! transfer rule. The library holds the simulation; the `tankflow` binary is
//! a terminal front-end that drives it.

pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod pipe;
pub mod report;
pub mod tank;

pub use error::{FlowError, FlowResult};
pub use flow::{FlowController, FlowRules, Snapshot, TickOutcome, Transfer};
pub use pipe::Pipe;
pub use report::Report;
pub use tank::Tank;
