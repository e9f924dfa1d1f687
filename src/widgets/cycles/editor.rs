//! Cycle editor for periodic-signal payloads.
//!
//! A cycle is index `i` across three parallel series: `valleys_start[i]`,
//! `peaks[i]`, `valleys_end[i]`. Cycles are added through a three-click
//! wizard (valley start, peak, valley end) that rejects points overlapping
//! existing cycles, removed by index from all three series at once, or
//! patched with quick-add (Q/W/E held while clicking) which appends a single
//! point without validation. A peak can be moved strictly inside its own
//! cycle.

use log::debug;
use std::fmt;

use crate::entities::payload::LINE_PLOT_KEY;
use crate::entities::{AnalysisPayload, Series};

pub const PEAKS_KEY: &str = "peaks";
pub const VALLEYS_START_KEY: &str = "valleys_start";
pub const VALLEYS_END_KEY: &str = "valleys_end";

/// Closed-open interval overlap.
pub fn intervals_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start < b_end && b_start < a_end
}

/// The three cycle series of a payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cycles {
    pub peaks: Series,
    pub valleys_start: Series,
    pub valleys_end: Series,
}

impl Cycles {
    /// None unless the payload carries all three series.
    pub fn from_payload(data: &AnalysisPayload) -> Option<Self> {
        Some(Self {
            peaks: data.series(PEAKS_KEY)?,
            valleys_start: data.series(VALLEYS_START_KEY)?,
            valleys_end: data.series(VALLEYS_END_KEY)?,
        })
    }

    pub fn write_to(&self, data: &mut AnalysisPayload) {
        data.set_series(PEAKS_KEY, &self.peaks);
        data.set_series(VALLEYS_START_KEY, &self.valleys_start);
        data.set_series(VALLEYS_END_KEY, &self.valleys_end);
    }

    /// Complete cycles (all three points present).
    pub fn len(&self) -> usize {
        self.peaks.len().min(self.valleys_start.len()).min(self.valleys_end.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `[valley_start, valley_end]` time spans, index-aligned.
    pub fn spans(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.valleys_start.time.iter().copied().zip(self.valleys_end.time.iter().copied())
    }

    /// x inside any existing cycle, edges included.
    pub fn in_any_cycle(&self, x: f64) -> bool {
        self.spans().any(|(s, e)| x >= s && x <= e)
    }

    pub fn overlaps_any(&self, start: f64, end: f64) -> bool {
        self.spans().any(|(s, e)| intervals_overlap(start, end, s, e))
    }

    /// Remove cycle `idx` from all three series.
    pub fn remove(&mut self, idx: usize) -> bool {
        if idx >= self.peaks.len() {
            return false;
        }
        self.peaks.remove(idx);
        self.valleys_start.remove(idx);
        self.valleys_end.remove(idx);
        true
    }

    /// Cycle whose span contains x, else the one with the nearest peak.
    pub fn cycle_at(&self, x: f64) -> Option<usize> {
        if let Some(idx) = self.spans().position(|(s, e)| x >= s && x <= e) {
            return Some(idx);
        }
        self.peaks
            .time
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - x).abs().total_cmp(&(b.1 - x).abs()))
            .map(|(i, _)| i)
    }
}

/// Trace sample nearest to time `x`, used to snap clicks onto the signal.
pub fn nearest_sample(trace: &Series, x: f64) -> Option<(f64, f64)> {
    trace.points().min_by(|a, b| (a.0 - x).abs().total_cmp(&(b.0 - x).abs()))
}

pub fn line_plot(data: &AnalysisPayload) -> Option<Series> {
    data.series(LINE_PLOT_KEY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleError {
    ValleyStartOverlaps,
    PeakBeforeValleyStart,
    PeakOverlaps,
    ValleyEndBeforePeak,
    ValleyEndOverlaps,
    PeakOutsideCycle,
    NoSuchCycle,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CycleError::ValleyStartOverlaps => "You are trying to place a valley start that overlaps another cycle.",
            CycleError::PeakBeforeValleyStart => "Peak time must be after the Valley Start time.",
            CycleError::PeakOverlaps => "Peak is overlapping with an existing cycle range.",
            CycleError::ValleyEndBeforePeak => "Valley end time must be after the Peak time.",
            CycleError::ValleyEndOverlaps => "Valley end is overlapping with an existing cycle range.",
            CycleError::PeakOutsideCycle => "Peak must lie within the valley start/end range.",
            CycleError::NoSuchCycle => "No cycle at that position.",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for CycleError {}

/// Point kind appended by quick-add (held key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAdd {
    /// Q
    Peak,
    /// W
    ValleyStart,
    /// E
    ValleyEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WizardStep {
    ValleyStart,
    Peak { valley_start: (f64, f64) },
    ValleyEnd { valley_start: (f64, f64), peak: (f64, f64) },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleMode {
    Browse,
    AddCycle(WizardStep),
    /// Waiting for a click on the cycle to remove
    Remove,
    /// Removal of a cycle awaiting confirmation
    ConfirmRemove { idx: usize },
    /// Moving the peak of cycle `idx`
    Reposition { idx: usize },
}

/// Result of a click on the plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// Nothing to do in the current mode
    Ignored,
    /// Wizard advanced; the prompt tells the user what to click next
    Pending(&'static str),
    /// A cycle was picked (for removal confirmation or peak repositioning)
    Selected(usize),
    /// The series changed and should be committed
    Changed,
}

#[derive(Debug, Clone)]
pub struct CycleEditor {
    mode: CycleMode,
    quick_add: Option<QuickAdd>,
}

impl Default for CycleEditor {
    fn default() -> Self {
        Self {
            mode: CycleMode::Browse,
            quick_add: None,
        }
    }
}

impl CycleEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> CycleMode {
        self.mode
    }

    pub fn quick_add(&self) -> Option<QuickAdd> {
        self.quick_add
    }

    /// Held key state; None when no quick-add key is down.
    pub fn set_quick_add(&mut self, kind: Option<QuickAdd>) {
        self.quick_add = kind;
    }

    pub fn start_add(&mut self) {
        self.mode = CycleMode::AddCycle(WizardStep::ValleyStart);
    }

    pub fn start_remove(&mut self) {
        self.mode = CycleMode::Remove;
    }

    /// Escape: drop any pending wizard points, selection or removal.
    pub fn cancel(&mut self) {
        if self.mode != CycleMode::Browse {
            debug!("Cycles: {:?} cancelled", self.mode);
        }
        self.mode = CycleMode::Browse;
        self.quick_add = None;
    }

    /// Points placed by the wizard so far.
    pub fn pending_points(&self) -> (Option<(f64, f64)>, Option<(f64, f64)>) {
        match self.mode {
            CycleMode::AddCycle(WizardStep::Peak { valley_start }) => (Some(valley_start), None),
            CycleMode::AddCycle(WizardStep::ValleyEnd { valley_start, peak }) => (Some(valley_start), Some(peak)),
            _ => (None, None),
        }
    }

    /// Cycle span to keep unshaded while repositioning a peak.
    pub fn focus_span(&self, cycles: &Cycles) -> Option<(f64, f64)> {
        match self.mode {
            CycleMode::Reposition { idx } => Some((*cycles.valleys_start.time.get(idx)?, *cycles.valleys_end.time.get(idx)?)),
            _ => None,
        }
    }

    /// Handle a click at `(x, y)` (time, value) on the plot.
    pub fn click(&mut self, cycles: &mut Cycles, x: f64, y: f64) -> Result<ClickOutcome, CycleError> {
        if let Some(kind) = self.quick_add.take() {
            match kind {
                QuickAdd::Peak => cycles.peaks.push(x, y),
                QuickAdd::ValleyStart => cycles.valleys_start.push(x, y),
                QuickAdd::ValleyEnd => cycles.valleys_end.push(x, y),
            }
            debug!("Cycles: quick-add {:?} at {:.3}", kind, x);
            return Ok(ClickOutcome::Changed);
        }

        match self.mode {
            CycleMode::AddCycle(step) => self.wizard_click(cycles, step, (x, y)),
            CycleMode::Remove => {
                let idx = cycles.cycle_at(x).ok_or(CycleError::NoSuchCycle)?;
                self.mode = CycleMode::ConfirmRemove { idx };
                Ok(ClickOutcome::Selected(idx))
            }
            CycleMode::ConfirmRemove { .. } => Ok(ClickOutcome::Ignored),
            CycleMode::Reposition { idx } => {
                let (Some(&vs), Some(&ve)) = (cycles.valleys_start.time.get(idx), cycles.valleys_end.time.get(idx)) else {
                    self.mode = CycleMode::Browse;
                    return Err(CycleError::NoSuchCycle);
                };
                if !(x > vs && x < ve) {
                    return Err(CycleError::PeakOutsideCycle);
                }
                if let (Some(t), Some(d)) = (cycles.peaks.time.get_mut(idx), cycles.peaks.data.get_mut(idx)) {
                    *t = x;
                    *d = y;
                }
                self.mode = CycleMode::Browse;
                debug!("Cycles: peak {} moved to {:.3}", idx, x);
                Ok(ClickOutcome::Changed)
            }
            CycleMode::Browse => {
                let Some(idx) = cycles.cycle_at(x) else {
                    return Ok(ClickOutcome::Ignored);
                };
                self.mode = CycleMode::Reposition { idx };
                Ok(ClickOutcome::Selected(idx))
            }
        }
    }

    fn wizard_click(&mut self, cycles: &mut Cycles, step: WizardStep, point: (f64, f64)) -> Result<ClickOutcome, CycleError> {
        let (x, _) = point;
        match step {
            WizardStep::ValleyStart => {
                if cycles.in_any_cycle(x) {
                    return Err(CycleError::ValleyStartOverlaps);
                }
                self.mode = CycleMode::AddCycle(WizardStep::Peak { valley_start: point });
                Ok(ClickOutcome::Pending("Next, select the new peak point."))
            }
            WizardStep::Peak { valley_start } => {
                if x <= valley_start.0 {
                    return Err(CycleError::PeakBeforeValleyStart);
                }
                if cycles.overlaps_any(valley_start.0, x) {
                    return Err(CycleError::PeakOverlaps);
                }
                self.mode = CycleMode::AddCycle(WizardStep::ValleyEnd { valley_start, peak: point });
                Ok(ClickOutcome::Pending("Finally, select the new valley end point."))
            }
            WizardStep::ValleyEnd { valley_start, peak } => {
                if x <= peak.0 {
                    return Err(CycleError::ValleyEndBeforePeak);
                }
                if cycles.overlaps_any(peak.0, x) {
                    return Err(CycleError::ValleyEndOverlaps);
                }
                cycles.valleys_start.push(valley_start.0, valley_start.1);
                cycles.peaks.push(peak.0, peak.1);
                cycles.valleys_end.push(point.0, point.1);
                self.mode = CycleMode::Browse;
                debug!("Cycles: cycle added [{:.3}, {:.3}]", valley_start.0, point.0);
                Ok(ClickOutcome::Changed)
            }
        }
    }

    /// Confirm a pending removal.
    pub fn confirm_remove(&mut self, cycles: &mut Cycles) -> Result<ClickOutcome, CycleError> {
        let CycleMode::ConfirmRemove { idx } = self.mode else {
            return Ok(ClickOutcome::Ignored);
        };
        self.mode = CycleMode::Browse;
        if !cycles.remove(idx) {
            return Err(CycleError::NoSuchCycle);
        }
        debug!("Cycles: cycle {} removed", idx);
        Ok(ClickOutcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Cycles [1, 2] and [4, 5]
    fn cycles() -> Cycles {
        Cycles {
            peaks: Series { data: vec![1.0, 1.1], time: vec![1.5, 4.5] },
            valleys_start: Series { data: vec![0.1, 0.2], time: vec![1.0, 4.0] },
            valleys_end: Series { data: vec![0.1, 0.2], time: vec![2.0, 5.0] },
        }
    }

    #[test]
    fn test_add_cycle_wizard() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        ed.start_add();
        assert!(matches!(ed.click(&mut c, 2.5, 0.0), Ok(ClickOutcome::Pending(_))));
        assert!(matches!(ed.click(&mut c, 3.0, 1.0), Ok(ClickOutcome::Pending(_))));
        assert_eq!(ed.pending_points(), (Some((2.5, 0.0)), Some((3.0, 1.0))));
        assert_eq!(ed.click(&mut c, 3.5, 0.0), Ok(ClickOutcome::Changed));
        assert_eq!(c.len(), 3);
        assert_eq!(c.valleys_start.time, vec![1.0, 4.0, 2.5]);
        assert_eq!(c.peaks.time, vec![1.5, 4.5, 3.0]);
        assert_eq!(c.valleys_end.time, vec![2.0, 5.0, 3.5]);
        assert_eq!(ed.mode(), CycleMode::Browse);
    }

    #[test]
    fn test_wizard_rejections() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        ed.start_add();
        // Edges count as inside
        assert_eq!(ed.click(&mut c, 2.0, 0.0), Err(CycleError::ValleyStartOverlaps));
        assert_eq!(
            CycleError::ValleyStartOverlaps.to_string(),
            "You are trying to place a valley start that overlaps another cycle."
        );
        ed.click(&mut c, 2.5, 0.0).unwrap();
        assert_eq!(ed.click(&mut c, 2.5, 1.0), Err(CycleError::PeakBeforeValleyStart));
        assert_eq!(ed.click(&mut c, 4.2, 1.0), Err(CycleError::PeakOverlaps));
        ed.click(&mut c, 3.0, 1.0).unwrap();
        assert_eq!(ed.click(&mut c, 2.9, 0.0), Err(CycleError::ValleyEndBeforePeak));
        assert_eq!(ed.click(&mut c, 4.5, 0.0), Err(CycleError::ValleyEndOverlaps));
        // Touching the next cycle's start is not an overlap
        assert_eq!(ed.click(&mut c, 4.0, 0.0), Ok(ClickOutcome::Changed));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_remove_cycle() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        ed.start_remove();
        assert_eq!(ed.click(&mut c, 4.2, 0.0), Ok(ClickOutcome::Selected(1)));
        assert_eq!(ed.confirm_remove(&mut c), Ok(ClickOutcome::Changed));
        assert_eq!(c.peaks.time, vec![1.5]);
        assert_eq!(c.valleys_start.time, vec![1.0]);
        assert_eq!(c.valleys_end.time, vec![2.0]);
        assert!(!c.remove(5));
    }

    #[test]
    fn test_quick_add_skips_validation() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        ed.set_quick_add(Some(QuickAdd::Peak));
        assert_eq!(ed.click(&mut c, 1.2, 0.7), Ok(ClickOutcome::Changed));
        assert_eq!(c.peaks.time, vec![1.5, 4.5, 1.2]);
        assert_eq!(c.valleys_start.len(), 2);
        assert!(ed.quick_add().is_none());
    }

    #[test]
    fn test_reposition_peak_within_cycle() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        assert_eq!(ed.click(&mut c, 1.6, 0.0), Ok(ClickOutcome::Selected(0)));
        assert_eq!(ed.focus_span(&c), Some((1.0, 2.0)));
        assert_eq!(ed.click(&mut c, 2.0, 0.9), Err(CycleError::PeakOutsideCycle));
        assert_eq!(ed.click(&mut c, 1.8, 0.9), Ok(ClickOutcome::Changed));
        assert_eq!((c.peaks.time[0], c.peaks.data[0]), (1.8, 0.9));
    }

    #[test]
    fn test_escape_cancels() {
        let mut c = cycles();
        let mut ed = CycleEditor::new();
        ed.start_add();
        ed.click(&mut c, 2.5, 0.0).unwrap();
        ed.cancel();
        assert_eq!(ed.mode(), CycleMode::Browse);
        assert_eq!(ed.pending_points(), (None, None));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_payload_round_trip_and_snap() {
        let mut data = AnalysisPayload::from_value(json!({
            "peaks": {"data": [1.0], "time": [0.5]},
            "valleys_start": {"data": [0.0], "time": [0.2]},
            "valleys_end": {"data": [0.0], "time": [0.9]},
            "linePlot": {"data": [0.0, 0.5, 1.0], "time": [0.0, 0.25, 0.5]}
        }))
        .unwrap();
        let mut c = Cycles::from_payload(&data).unwrap();
        c.remove(0);
        c.write_to(&mut data);
        assert_eq!(data.get("peaks"), Some(&json!({"data": [], "time": []})));
        let trace = line_plot(&data).unwrap();
        assert_eq!(nearest_sample(&trace, 0.3), Some((0.25, 0.5)));
        assert!(Cycles::from_payload(&AnalysisPayload::new()).is_none());
    }
}
