//! Segment timeline - task segments as draggable regions on a time axis

pub mod regions;
mod timeline_ui;

pub use regions::{Region, RegionTool, SegmentTimeline, TimelineDragState};
pub use timeline_ui::{TimelineResponse, render_timeline};
