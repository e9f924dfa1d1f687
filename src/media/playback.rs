//! Transport controls shared by the keyboard handler and the control bar.
//!
//! Every control is a no-op until the media reports ready.

use log::debug;

use super::MediaSource;

/// Arrow keys step by one frame
pub const FRAME_STEP: i64 = 1;
/// Shift+arrow jumps
pub const FRAME_JUMP: i64 = 5;
/// How close to a segment end playback may get before looping back
pub const LOOP_GUARD_SECS: f64 = 0.05;

pub fn total_frames(fps: f64, duration: f64) -> i64 {
    if fps <= 0.0 || !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    (fps * duration).round() as i64
}

/// Returns the new playing state, or None when the media is not ready.
pub fn toggle_play(media: &mut dyn MediaSource) -> Option<bool> {
    if !media.is_ready() {
        return None;
    }
    if media.is_playing() {
        media.pause();
    } else {
        media.play();
    }
    Some(media.is_playing())
}

/// Step by `delta` frames from the current time. Pauses first.
pub fn step_frames(media: &mut dyn MediaSource, delta: i64) -> bool {
    if !media.is_ready() || media.fps() <= 0.0 {
        return false;
    }
    media.pause();
    let t = (media.current_time() + delta as f64 / media.fps()).clamp(0.0, media.duration());
    media.seek(t);
    debug!("Step {:+} frames -> {:.3}s", delta, t);
    true
}

pub fn seek_frame(media: &mut dyn MediaSource, frame: i64) -> bool {
    if !media.is_ready() || media.fps() <= 0.0 {
        return false;
    }
    let last = (total_frames(media.fps(), media.duration()) - 1).max(0);
    let frame = frame.clamp(0, last);
    media.seek(frame as f64 / media.fps());
    true
}

pub fn seek_time(media: &mut dyn MediaSource, t: f64) -> bool {
    if !media.is_ready() || !t.is_finite() {
        return false;
    }
    media.seek(t.clamp(0.0, media.duration()));
    true
}

/// Keeps playback inside the selected task's segment.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SegmentLoop {
    range: Option<(f64, f64)>,
}

impl SegmentLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Change the segment. Entering a new segment seeks to its start.
    pub fn set(&mut self, media: &mut dyn MediaSource, range: Option<(f64, f64)>) {
        if self.range == range {
            return;
        }
        self.range = range;
        if let Some((start, _)) = range {
            seek_time(media, start);
        }
    }

    /// Seek back to the start when playback reaches the end of the segment.
    pub fn enforce(&self, media: &mut dyn MediaSource) -> bool {
        let Some((start, end)) = self.range else {
            return false;
        };
        if media.is_ready() && media.is_playing() && media.current_time() >= end - LOOP_GUARD_SECS {
            media.seek(start);
            return true;
        }
        false
    }
}

/// Decides when a decoder hands a frame to the frame clock: once per new
/// frame index, and once more after anything that moves the clock without
/// changing the frame (pause, seek, end of stream).
#[derive(Debug, Clone, PartialEq)]
pub struct PresentGate {
    last_frame: Option<i64>,
    pending: bool,
}

impl Default for PresentGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentGate {
    /// The first poll always presents.
    pub fn new() -> Self {
        Self { last_frame: None, pending: true }
    }

    /// Present the next polled frame even if its index did not change.
    pub fn invalidate(&mut self) {
        self.pending = true;
    }

    pub fn should_present(&self, frame: i64) -> bool {
        self.pending || self.last_frame != Some(frame)
    }

    pub fn presented(&mut self, frame: i64) {
        self.last_frame = Some(frame);
        self.pending = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media::Presentation;
    use std::time::Instant;

    /// In-memory media for control and editor tests.
    #[derive(Debug, Default)]
    pub(crate) struct StubMedia {
        pub ready: bool,
        pub playing: bool,
        pub time: f64,
        pub fps: f64,
        pub duration: f64,
        pub seeks: Vec<f64>,
    }

    impl StubMedia {
        pub fn ready(fps: f64, duration: f64) -> Self {
            Self {
                ready: true,
                fps,
                duration,
                ..Default::default()
            }
        }
    }

    impl MediaSource for StubMedia {
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn intrinsic_size(&self) -> Option<(u32, u32)> {
            self.ready.then_some((640, 360))
        }
        fn fps(&self) -> f64 {
            self.fps
        }
        fn duration(&self) -> f64 {
            self.duration
        }
        fn current_time(&self) -> f64 {
            self.time
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek(&mut self, t: f64) {
            self.time = t;
            self.seeks.push(t);
        }
        fn poll(&mut self, _now: Instant) -> Option<Presentation> {
            None
        }
    }

    #[test]
    fn test_controls_noop_when_not_ready() {
        let mut media = StubMedia::default();
        assert_eq!(toggle_play(&mut media), None);
        assert!(!step_frames(&mut media, 1));
        assert!(!seek_frame(&mut media, 10));
        assert!(media.seeks.is_empty());
        assert!(!media.playing);
    }

    #[test]
    fn test_toggle_and_step() {
        let mut media = StubMedia::ready(30.0, 10.0);
        assert_eq!(toggle_play(&mut media), Some(true));
        assert!(step_frames(&mut media, FRAME_JUMP));
        assert!(!media.playing);
        assert!((media.time - 5.0 / 30.0).abs() < 1e-9);
        assert!(step_frames(&mut media, -FRAME_JUMP * 10));
        assert_eq!(media.time, 0.0);
    }

    #[test]
    fn test_seek_frame_clamps() {
        let mut media = StubMedia::ready(25.0, 4.0);
        assert_eq!(total_frames(25.0, 4.0), 100);
        seek_frame(&mut media, 500);
        assert!((media.time - 99.0 / 25.0).abs() < 1e-9);
        seek_frame(&mut media, 50);
        assert!((media.time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_loop() {
        let mut media = StubMedia::ready(30.0, 10.0);
        let mut seg = SegmentLoop::new();
        seg.set(&mut media, Some((2.0, 4.0)));
        assert_eq!(media.time, 2.0);

        media.playing = true;
        media.time = 3.9;
        assert!(!seg.enforce(&mut media));
        media.time = 3.96;
        assert!(seg.enforce(&mut media));
        assert_eq!(media.time, 2.0);

        // Paused at the end is left alone
        media.playing = false;
        media.time = 4.0;
        assert!(!seg.enforce(&mut media));

        // Same range again does not re-seek
        let seeks = media.seeks.len();
        seg.set(&mut media, Some((2.0, 4.0)));
        assert_eq!(media.seeks.len(), seeks);
    }

    /// What a decoder poll does with the gate when the image is available.
    fn poll(gate: &mut PresentGate, frame: i64) -> bool {
        if !gate.should_present(frame) {
            return false;
        }
        gate.presented(frame);
        true
    }

    #[test]
    fn test_present_gate_repeated_poll_same_frame() {
        let mut gate = PresentGate::new();
        assert!(poll(&mut gate, 0));
        // UI repaints faster than the video frame rate
        for _ in 0..5 {
            assert!(!poll(&mut gate, 0));
        }
        assert!(poll(&mut gate, 1));
        assert!(!poll(&mut gate, 1));
    }

    #[test]
    fn test_present_gate_pause_presents_once() {
        let mut gate = PresentGate::new();
        assert!(poll(&mut gate, 12));
        gate.invalidate();
        assert!(poll(&mut gate, 12));
        assert!(!poll(&mut gate, 12));
        assert!(!poll(&mut gate, 12));
    }

    #[test]
    fn test_present_gate_seek_onto_same_frame() {
        let mut gate = PresentGate::new();
        assert!(poll(&mut gate, 40));
        gate.invalidate();
        assert!(gate.should_present(40));
        assert!(poll(&mut gate, 40));
        assert!(!gate.should_present(40));

        // Seek elsewhere presents regardless of invalidation
        assert!(gate.should_present(7));
    }

    #[test]
    fn test_present_gate_failed_fetch_retries() {
        let mut gate = PresentGate::new();
        gate.presented(3);
        gate.invalidate();
        // Image unavailable: nothing recorded, the next poll asks again
        assert!(gate.should_present(3));
        assert!(gate.should_present(3));
        gate.presented(3);
        assert!(!gate.should_present(3));
    }
}
