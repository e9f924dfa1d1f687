use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::Task;

pub const FOCAL_LENGTH_KEY: &str = "focal_length";
pub const HEIGHT_KEY: &str = "height";

/// Camera/subject calibration shared by every calibrated task editor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    pub focal_length: Option<f64>,
    pub height: Option<f64>,
}

impl Calibration {
    pub fn is_empty(&self) -> bool {
        self.focal_length.is_none() && self.height.is_none()
    }

    /// Write the calibration into a task's extra fields.
    ///
    /// A task whose fields actually change loses its analysis payload.
    pub fn apply_to(&self, task: &mut Task) -> bool {
        let mut changed = false;
        for (key, value) in [(FOCAL_LENGTH_KEY, self.focal_length), (HEIGHT_KEY, self.height)] {
            let Some(value) = value else { continue };
            let new = Value::from(value);
            if task.extra.get(key) != Some(&new) {
                task.extra.insert(key.to_string(), new);
                changed = true;
            }
        }
        if changed {
            task.data = None;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::payload::AnalysisPayload;

    #[test]
    fn test_apply_resets_data_only_on_change() {
        let mut task = Task::new(1, "Gait", 0.0, 2.0);
        task.data = Some(AnalysisPayload::new());
        let cal = Calibration { focal_length: Some(28.0), height: None };

        assert!(cal.apply_to(&mut task));
        assert!(task.data.is_none());
        assert_eq!(task.extra[FOCAL_LENGTH_KEY], 28.0);
        assert!(task.extra.get(HEIGHT_KEY).is_none());

        task.data = Some(AnalysisPayload::new());
        assert!(!cal.apply_to(&mut task));
        assert!(task.data.is_some());
    }
}
