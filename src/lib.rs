//! Kinemark - frame-synchronized video annotation workstation.
//!
//! The engine keeps a decoded video frame, its vector overlays and a
//! segment timeline in lockstep with the media clock, turns pointer
//! gestures into annotation edits, and reconciles those edits with an
//! analysis backend plus a debounced autosave.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod entities;
pub mod media;
pub mod render;
pub mod screen;
pub mod widgets;
