//! Frame clock: maps decoder presentation timestamps to integer frame indices.
//!
//! The media source calls [`FrameClock::present`] once per decoded frame
//! (plus one terminal presentation when playback pauses or a seek lands).
//! Each presentation becomes a [`FrameTick`] on the event bus, which the
//! renderer and overlay editor read.
//!
//! Swapping the media element calls [`FrameClock::attach`] again, bumping the
//! generation; [`FrameClock::detach`] stops publishing until re-attached.

use log::{debug, trace};

use super::event_bus::{EventBus, Subscription};

/// Frame index for a presentation time: `round(t * fps)`.
///
/// Negative or non-finite input clamps to frame 0.
pub fn frame_at(t: f64, fps: f64) -> i64 {
    if fps <= 0.0 || !t.is_finite() || t <= 0.0 {
        return 0;
    }
    (t * fps).round() as i64
}

/// Frame index relative to a task's first frame, used for landmark lookups.
pub fn landmark_frame_index(frame: i64, task_start: f64, fps: f64) -> i64 {
    frame - (task_start * fps).floor() as i64
}

/// Published once per presented frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub frame: i64,
    pub media_time: f64,
    pub playing: bool,
    /// Media attachment generation the tick belongs to
    pub generation: u64,
}

#[derive(Debug)]
pub struct FrameClock {
    fps: f64,
    bus: EventBus,
    generation: u64,
    attached: bool,
    last: Option<FrameTick>,
}

impl FrameClock {
    pub fn new(bus: EventBus) -> Self {
        Self {
            fps: 30.0,
            bus,
            generation: 0,
            attached: false,
            last: None,
        }
    }

    /// Attach to a (new) media element. Returns the new generation.
    pub fn attach(&mut self, fps: f64) -> u64 {
        self.generation += 1;
        self.fps = if fps > 0.0 { fps } else { 30.0 };
        self.attached = true;
        self.last = None;
        debug!("FrameClock attached: gen={} fps={:.3}", self.generation, self.fps);
        self.generation
    }

    /// Stop publishing ticks (media torn down).
    pub fn detach(&mut self) {
        if self.attached {
            debug!("FrameClock detached: gen={}", self.generation);
        }
        self.attached = false;
        self.last = None;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn set_fps(&mut self, fps: f64) {
        if fps > 0.0 {
            self.fps = fps;
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Presentation callback from the decoder.
    ///
    /// Returns the published tick, or None while detached.
    pub fn present(&mut self, media_time: f64, playing: bool) -> Option<FrameTick> {
        if !self.attached {
            trace!("FrameClock: presentation at {:.3}s ignored (detached)", media_time);
            return None;
        }
        let tick = FrameTick {
            frame: frame_at(media_time, self.fps),
            media_time,
            playing,
            generation: self.generation,
        };
        self.last = Some(tick);
        self.bus.emit(tick);
        Some(tick)
    }

    pub fn last_tick(&self) -> Option<FrameTick> {
        self.last
    }

    pub fn current_frame(&self) -> Option<i64> {
        self.last.map(|t| t.frame)
    }

    /// Landmark frame index for the active task, None without a task or tick.
    pub fn landmark_frame_index(&self, task_start: Option<f64>) -> Option<i64> {
        let frame = self.current_frame()?;
        Some(landmark_frame_index(frame, task_start?, self.fps))
    }

    /// Subscribe to ticks; the callback lives as long as the guard.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FrameTick) + Send + Sync + 'static,
    {
        self.bus.subscribe::<FrameTick, _>(callback)
    }
}
