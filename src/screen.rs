use serde::{Deserialize, Serialize};

/// Workspace screen the annotator is showing.
///
/// Screens gate which overlays are editable and what the canvas paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Screen {
    /// Pick which detected person is the analysis subject.
    #[default]
    SubjectResolution,
    /// Segment the video into tasks and adjust task boxes.
    Tasks,
    /// Inspect one task: landmarks, cycles, analysis payload.
    TaskDetails,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::SubjectResolution, Screen::Tasks, Screen::TaskDetails];

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::SubjectResolution => "subjects",
            Screen::Tasks => "tasks",
            Screen::TaskDetails => "taskDetails",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "subjects" => Some(Screen::SubjectResolution),
            "tasks" => Some(Screen::Tasks),
            "taskDetails" => Some(Screen::TaskDetails),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::SubjectResolution => "Subjects",
            Screen::Tasks => "Tasks",
            Screen::TaskDetails => "Task Details",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_str_roundtrip_names() {
        for screen in Screen::ALL {
            assert_eq!(Screen::from_str(screen.as_str()), Some(screen));
        }
        assert_eq!(Screen::from_str("upload"), None);
    }
}
