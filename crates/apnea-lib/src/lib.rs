pub mod clean;
pub mod config;
pub mod dataset;
pub mod detectors;
pub mod error;
pub mod extract;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod record;
pub mod signal;

pub use clean::*;
pub use dataset::*;
pub use error::*;
pub use extract::*;
pub use signal::*;
