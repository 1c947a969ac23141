//! Synthetic data generation for demos and smoke runs.

pub mod sample;

pub use sample::{SampleConfig, generate_sample, write_sample_csv};
