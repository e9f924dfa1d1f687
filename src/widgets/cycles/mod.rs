//! Periodic-signal cycle editing for task analysis results.

pub mod editor;
mod cycles_ui;

pub use cycles_ui::{CyclesPanel, CyclesResponse, render_cycles};
pub use editor::{CycleEditor, CycleError, CycleMode, Cycles};
