pub mod buffer;
pub mod clock;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod roi;
pub mod session;
pub mod signal;
pub mod source;

pub use error::PipelineError;
pub use metrics::*;
pub use pipeline::{Baseline, Pipeline, PipelineConfig, TickOutputs};
pub use signal::*;
