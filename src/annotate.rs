use crate::model::{AnnotatedLesson, Lesson};
use crate::timegrid::{end_index, lesson_span, SlotIndex};

/// Attaches the grid position to `lesson`. `None` when its start slot is not
/// part of the current slot table.
pub fn annotate(lesson: Lesson, index: &SlotIndex) -> Option<AnnotatedLesson> {
    let start_slot_index = index.position(&lesson.time_slot)?;
    Some(place(lesson, start_slot_index))
}

/// Positions `lesson` at an explicit start index, e.g. a drop target.
pub fn place(lesson: Lesson, start_slot_index: usize) -> AnnotatedLesson {
    let span = lesson_span(lesson.duration);
    AnnotatedLesson {
        lesson,
        start_slot_index,
        span,
        end_slot_index: end_index(start_slot_index, span),
    }
}

/// Annotates every lesson, dropping stale ones instead of failing the batch.
pub fn annotate_all<I>(lessons: I, index: &SlotIndex) -> Vec<AnnotatedLesson>
where
    I: IntoIterator<Item = Lesson>,
{
    lessons
        .into_iter()
        .filter_map(|lesson| {
            let id = lesson.id.clone();
            let slot = lesson.time_slot.clone();
            let annotated = annotate(lesson, index);
            if annotated.is_none() {
                tracing::debug!(lesson_id = %id, time_slot = %slot, "dropping lesson with unknown time slot");
            }
            annotated
        })
        .collect()
}
