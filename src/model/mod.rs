pub mod config;
pub mod decision;
pub mod extracted;
pub mod posture;
pub mod thread;
pub mod ticket;

pub use config::{Config, PipelineConfig, RiskPostureConfig, SchemaPolicy};
pub use decision::*;
pub use posture::{RiskPostureReport, RiskyRequest};
pub use thread::*;
pub use ticket::*;
