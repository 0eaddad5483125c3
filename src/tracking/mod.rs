pub mod config;
pub mod controller;
mod loop_worker;
pub mod sampler;

pub use config::{BatteryAction, BatteryPolicy, SamplerConfig};
pub use controller::TrackingController;
pub use loop_worker::TrackingDeps;
pub use sampler::{AccuracyLevel, MeasurementSampler, TrackingState, TrackingStatus};
