//! Annotation data model and the store that owns it.

pub mod bbox;
pub mod calibration;
pub mod import;
pub mod payload;
pub mod person;
pub mod store;
pub mod task;

pub use bbox::{BoundingBoxFrame, BoxRect, Detection, PersonId};
pub use calibration::Calibration;
pub use import::ImportError;
pub use payload::{AnalysisPayload, LandmarkFrame, Series};
pub use person::Person;
pub use store::{AnnotationStore, Slice, StoreChanged, TaskBoxPolicy, VideoChanged, VideoSession};
pub use task::{Task, TaskBox, TaskId};
