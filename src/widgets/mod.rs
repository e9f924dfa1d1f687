//! UI widgets: viewport with overlay editing, segment timeline, cycle plot

pub mod cycles;
pub mod timeline;
pub mod viewport;
