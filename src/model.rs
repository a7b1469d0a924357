use serde::{Deserialize, Serialize};

pub const DEFAULT_LESSON_COLOR: &str = "#667eea";

/// One fixed-width cell of the day grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub display_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub id: String,
    pub name: String,
}

/// Co-teaching staff attached to a lesson next to its primary teacher/assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl StaffRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            color: None,
        }
    }
}

/// Display names joined in from reference data. Only used for messages and rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonLabels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
}

/// A scheduled class occurrence. `time_slot` is the id of the start slot and
/// `duration` is in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub group_id: String,
    pub time_slot: String,
    pub subject_id: String,
    pub teacher_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    pub room_id: String,
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub additional_teachers: Vec<StaffRef>,
    #[serde(default)]
    pub additional_assistants: Vec<StaffRef>,
    #[serde(flatten)]
    pub labels: LessonLabels,
}

impl Lesson {
    /// Lesson color, then teacher color, then subject color, then the default.
    pub fn display_color(&self) -> &str {
        [
            self.color.as_deref(),
            self.labels.teacher_color.as_deref(),
            self.labels.subject_color.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_LESSON_COLOR)
    }

    /// Ids of the additional teachers, blanks skipped.
    pub fn additional_teacher_ids(&self) -> impl Iterator<Item = &str> {
        self.additional_teachers
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// A lesson with its computed grid position. Both slot indices are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLesson {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub start_slot_index: usize,
    pub span: usize,
    pub end_slot_index: usize,
}

impl AnnotatedLesson {
    pub fn id(&self) -> &str {
        &self.lesson.id
    }

    /// True when the two lessons share at least one slot.
    pub fn overlaps(&self, other: &AnnotatedLesson) -> bool {
        ranges_overlap(
            (self.start_slot_index, self.end_slot_index),
            (other.start_slot_index, other.end_slot_index),
        )
    }
}

/// Inclusive slot ranges `(start, end)` overlap iff they share a slot.
pub fn ranges_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Room,
    Group,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Room => "room",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub message: String,
    pub conflicting_lesson: AnnotatedLesson,
}
