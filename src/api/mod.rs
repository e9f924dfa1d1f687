//! Analysis backend: request bodies, HTTP client, autosave.

pub mod autosave;
pub mod client;
pub mod error;
pub mod requests;

pub use autosave::{AutoSave, SliceSnapshot, stable_json};
pub use client::{AnalysisBackend, HttpBackend};
pub use error::ApiError;
pub use requests::{LandmarkUpdate, PlotUpdate, TaskAnalysis};
