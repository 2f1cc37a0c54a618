//! Acquisition module tying discovery, transport, decoding and logging together.

pub mod runner;

pub use runner::{run, AcquisitionError, AcquisitionLoop, AcquisitionSummary};
