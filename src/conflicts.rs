use crate::model::{AnnotatedLesson, ConflictInfo, ConflictKind, Lesson, StaffRef};
use std::collections::BTreeMap;

/// Conflicts per lesson id; lessons without conflicts are absent.
pub type ConflictMap = BTreeMap<String, Vec<ConflictInfo>>;

fn label<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|s| !s.trim().is_empty()).unwrap_or(fallback)
}

fn staff_label(staff: &StaffRef) -> &str {
    label(Some(staff.name.as_str()), "unknown teacher")
}

struct Occupied<'a> {
    lesson: &'a Lesson,
}

impl<'a> Occupied<'a> {
    fn subject(&self) -> &'a str {
        label(self.lesson.labels.subject_name.as_deref(), "unknown subject")
    }

    fn group(&self) -> &'a str {
        label(self.lesson.labels.group_name.as_deref(), "unknown group")
    }

    fn room(&self) -> &'a str {
        label(self.lesson.labels.room_name.as_deref(), "unknown room")
    }

    fn teacher(&self) -> &'a str {
        label(self.lesson.labels.teacher_name.as_deref(), "unknown teacher")
    }
}

/// Every resource conflict between `candidate` and the other lessons.
///
/// Lessons sharing the candidate's id are skipped, so the candidate may be
/// part of `lessons`. For each pair whose slot ranges share a slot the checks
/// run in a fixed order: room, group, primary teacher, then the additional
/// teacher cross-checks. Each match yields its own entry; nothing is merged.
pub fn detect_conflicts(
    candidate: &AnnotatedLesson,
    lessons: &[AnnotatedLesson],
) -> Vec<ConflictInfo> {
    let mut conflicts = Vec::new();
    let cand = &candidate.lesson;

    for existing in lessons {
        if existing.id() == candidate.id() || !candidate.overlaps(existing) {
            continue;
        }
        let other = &existing.lesson;
        let occ = Occupied { lesson: other };
        let mut push = |kind: ConflictKind, message: String| {
            conflicts.push(ConflictInfo {
                kind,
                message,
                conflicting_lesson: existing.clone(),
            });
        };

        if other.room_id == cand.room_id {
            push(
                ConflictKind::Room,
                format!(
                    "Room {} is already taken by \"{}\" for group {}",
                    occ.room(),
                    occ.subject(),
                    occ.group()
                ),
            );
        }

        if other.group_id == cand.group_id {
            push(
                ConflictKind::Group,
                format!(
                    "Group {} already has \"{}\" at this time",
                    occ.group(),
                    occ.subject()
                ),
            );
        }

        if other.teacher_id == cand.teacher_id {
            push(
                ConflictKind::Teacher,
                format!(
                    "Teacher {} is already teaching \"{}\" for group {}",
                    occ.teacher(),
                    occ.subject(),
                    occ.group()
                ),
            );
        }

        for extra in cand.additional_teachers.iter().filter(|t| !t.id.is_empty()) {
            if other.teacher_id == extra.id {
                push(
                    ConflictKind::Teacher,
                    format!(
                        "Teacher {} is already teaching \"{}\" for group {}",
                        staff_label(extra),
                        occ.subject(),
                        occ.group()
                    ),
                );
            }
            for other_extra in other.additional_teacher_ids() {
                if other_extra == extra.id {
                    push(
                        ConflictKind::Teacher,
                        format!(
                            "Teacher {} is already co-teaching \"{}\" for group {}",
                            staff_label(extra),
                            occ.subject(),
                            occ.group()
                        ),
                    );
                }
            }
        }

        for other_extra in other.additional_teacher_ids() {
            if other_extra == cand.teacher_id {
                push(
                    ConflictKind::Teacher,
                    format!(
                        "Teacher {} is already co-teaching \"{}\" for group {}",
                        label(cand.labels.teacher_name.as_deref(), "unknown teacher"),
                        occ.subject(),
                        occ.group()
                    ),
                );
            }
        }
    }

    conflicts
}

/// Runs [`detect_conflicts`] with every lesson as the candidate.
pub fn find_all_conflicts(lessons: &[AnnotatedLesson]) -> ConflictMap {
    let mut map = ConflictMap::new();
    for lesson in lessons {
        let conflicts = detect_conflicts(lesson, lessons);
        if !conflicts.is_empty() {
            map.entry(lesson.id().to_string())
                .or_default()
                .extend(conflicts);
        }
    }
    map
}

pub fn has_conflicts(map: &ConflictMap, lesson_id: &str) -> bool {
    map.contains_key(lesson_id)
}

/// Distinct conflict kinds recorded for a lesson, in first-seen order.
pub fn conflict_kinds(map: &ConflictMap, lesson_id: &str) -> Vec<ConflictKind> {
    let mut kinds = Vec::new();
    for c in map.get(lesson_id).into_iter().flatten() {
        if !kinds.contains(&c.kind) {
            kinds.push(c.kind);
        }
    }
    kinds
}

/// Overlapping lessons that share the candidate's room or group, each once.
/// Teachers are not considered.
pub fn blocking_lessons<'a>(
    candidate: &AnnotatedLesson,
    lessons: &'a [AnnotatedLesson],
) -> Vec<&'a AnnotatedLesson> {
    lessons
        .iter()
        .filter(|l| l.id() != candidate.id() && candidate.overlaps(l))
        .filter(|l| {
            l.lesson.room_id == candidate.lesson.room_id
                || l.lesson.group_id == candidate.lesson.group_id
        })
        .collect()
}
