use serde::{Deserialize, Deserializer, Serialize};

use super::bbox::{BoundingBoxFrame, PersonId};

/// A tracked person, created from its first detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    /// First frame the person was detected in
    pub frame_number: i64,
    /// First-seen time in seconds, two decimals. Bundles may carry a number.
    #[serde(deserialize_with = "timestamp_text")]
    pub timestamp: String,
    #[serde(default)]
    pub is_subject: bool,
}

impl Person {
    pub fn first_seen_secs(&self) -> f64 {
        self.timestamp.parse().unwrap_or(0.0)
    }
}

fn timestamp_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(secs) => format!("{:.2}", secs),
    })
}

/// Scan detections for the first occurrence of each id (by frame number).
///
/// A lone person is marked as the subject automatically.
pub fn derive_persons(frames: &[BoundingBoxFrame], fps: f64) -> Vec<Person> {
    let mut ordered: Vec<&BoundingBoxFrame> = frames.iter().collect();
    ordered.sort_by_key(|f| f.frame_number);

    let mut persons: Vec<Person> = Vec::new();
    for frame in ordered {
        for det in &frame.data {
            if persons.iter().any(|p| p.id == det.id) {
                continue;
            }
            let secs = if fps > 0.0 { frame.frame_number as f64 / fps } else { 0.0 };
            persons.push(Person {
                id: det.id,
                name: format!("Person {}", det.id),
                frame_number: frame.frame_number,
                timestamp: format!("{:.2}", secs),
                is_subject: false,
            });
        }
    }
    auto_mark_single_subject(&mut persons);
    persons
}

/// Mark the only person as subject. Returns true if anything changed.
pub fn auto_mark_single_subject(persons: &mut [Person]) -> bool {
    if let [only] = persons {
        if !only.is_subject {
            only.is_subject = true;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::bbox::Detection;

    fn frame(n: i64, ids: &[PersonId]) -> BoundingBoxFrame {
        BoundingBoxFrame {
            frame_number: n,
            data: ids
                .iter()
                .map(|&id| Detection { id, x: 0.0, y: 0.0, width: 1.0, height: 1.0 })
                .collect(),
        }
    }

    #[test]
    fn test_first_occurrence() {
        let frames = vec![frame(30, &[1, 2]), frame(15, &[2]), frame(45, &[3])];
        let persons = derive_persons(&frames, 30.0);
        assert_eq!(persons.len(), 3);
        assert_eq!(persons[0].id, 2);
        assert_eq!(persons[0].frame_number, 15);
        assert_eq!(persons[0].timestamp, "0.50");
        assert_eq!(persons[1].name, "Person 1");
        assert_eq!(persons[2].timestamp, "1.50");
        assert!(persons.iter().all(|p| !p.is_subject));
    }

    #[test]
    fn test_single_person_auto_subject() {
        let persons = derive_persons(&[frame(0, &[7]), frame(1, &[7])], 25.0);
        assert_eq!(persons.len(), 1);
        assert!(persons[0].is_subject);
        assert_eq!(persons[0].first_seen_secs(), 0.0);
    }

    #[test]
    fn test_timestamp_accepts_number_or_string() {
        let text: Person = serde_json::from_str(
            r#"{"id": 4, "name": "Ana", "frameNumber": 12, "timestamp": "0.40"}"#,
        )
        .unwrap();
        assert_eq!(text.timestamp, "0.40");
        assert!(!text.is_subject);

        let number: Person = serde_json::from_str(
            r#"{"id": 5, "name": "Ben", "frameNumber": 75, "timestamp": 2.5, "isSubject": true}"#,
        )
        .unwrap();
        assert_eq!(number.timestamp, "2.50");
        assert_eq!(number.first_seen_secs(), 2.5);
        assert!(number.is_subject);

        let int: Person =
            serde_json::from_str(r#"{"id": 6, "name": "Cy", "frameNumber": 0, "timestamp": 3}"#).unwrap();
        assert_eq!(int.timestamp, "3.00");

        assert!(serde_json::from_str::<Person>(r#"{"id": 7, "name": "D", "frameNumber": 0, "timestamp": null}"#).is_err());
    }
}
