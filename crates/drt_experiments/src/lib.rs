//! Experiment harness for the DRT scheduling core: demand generation,
//! scenario runs (offline one-shot or online event loop), and result export.

pub mod export;
pub mod generator;
pub mod runner;
