use crate::model::{ranges_overlap, AnnotatedLesson, Room};
use crate::timegrid::{end_index, lesson_span, SlotIndex};
use std::collections::HashSet;

/// Rooms not used by any lesson overlapping the window that starts at
/// `time_slot_id` and lasts `duration` minutes, in `rooms` order.
///
/// Every lesson in `lessons` counts as occupying its room. When searching for
/// a lesson that is being edited, leave that lesson out of `lessons` first.
/// An unknown slot id yields no rooms.
pub fn find_available_rooms(
    time_slot_id: &str,
    duration: i64,
    lessons: &[AnnotatedLesson],
    rooms: &[Room],
    index: &SlotIndex,
) -> Vec<Room> {
    if rooms.is_empty() {
        return Vec::new();
    }
    let Some(start) = index.position(time_slot_id) else {
        return Vec::new();
    };
    let end = end_index(start, lesson_span(duration));

    let occupied: HashSet<&str> = lessons
        .iter()
        .filter(|l| ranges_overlap((start, end), (l.start_slot_index, l.end_slot_index)))
        .map(|l| l.lesson.room_id.as_str())
        .collect();

    rooms
        .iter()
        .filter(|r| !occupied.contains(r.id.as_str()))
        .cloned()
        .collect()
}

pub fn is_room_available(
    room_id: &str,
    time_slot_id: &str,
    duration: i64,
    lessons: &[AnnotatedLesson],
    index: &SlotIndex,
) -> bool {
    let probe = [Room {
        id: room_id.to_string(),
        name: String::new(),
    }];
    !find_available_rooms(time_slot_id, duration, lessons, &probe, index).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::place;
    use crate::model::{Lesson, LessonLabels};
    use crate::timegrid::{generate_time_slots, DayWindow};

    fn rooms() -> Vec<Room> {
        (1..=4)
            .map(|i| Room {
                id: format!("room{i}"),
                name: format!("Room {i}"),
            })
            .collect()
    }

    fn busy(id: &str, room: &str, start: usize, duration: i64) -> AnnotatedLesson {
        place(
            Lesson {
                id: id.into(),
                group_id: "g1".into(),
                time_slot: (start + 1).to_string(),
                subject_id: "s1".into(),
                teacher_id: "t1".into(),
                assistant_id: None,
                room_id: room.into(),
                duration,
                color: None,
                comment: None,
                additional_teachers: Vec::new(),
                additional_assistants: Vec::new(),
                labels: LessonLabels::default(),
            },
            start,
        )
    }

    fn index() -> SlotIndex {
        SlotIndex::new(&generate_time_slots(&DayWindow::default()))
    }

    #[test]
    fn excludes_rooms_of_overlapping_lessons() {
        let lessons = vec![busy("a", "room2", 0, 45)];
        // slot id "3" is index 2; 25 minutes covers [2, 6]
        let free = find_available_rooms("3", 25, &lessons, &rooms(), &index());
        let ids: Vec<_> = free.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["room1", "room3", "room4"]);
    }

    #[test]
    fn later_window_sees_room_free_again() {
        let lessons = vec![busy("a", "room2", 0, 45)];
        let free = find_available_rooms("10", 45, &lessons, &rooms(), &index());
        assert_eq!(free.len(), 4);
        assert!(is_room_available("room2", "10", 45, &lessons, &index()));
        assert!(!is_room_available("room2", "9", 45, &lessons, &index()));
    }

    #[test]
    fn unknown_slot_or_no_rooms_yield_nothing() {
        let lessons = vec![busy("a", "room2", 0, 45)];
        assert!(find_available_rooms("0", 45, &lessons, &rooms(), &index()).is_empty());
        assert!(find_available_rooms("1", 45, &lessons, &[], &index()).is_empty());
    }

    #[test]
    fn edited_lesson_must_be_filtered_by_caller() {
        let lessons = vec![busy("a", "room2", 0, 45)];
        let with_self = find_available_rooms("1", 45, &lessons, &rooms(), &index());
        assert!(with_self.iter().all(|r| r.id != "room2"));

        let without_self: Vec<_> = lessons.into_iter().filter(|l| l.id() != "a").collect();
        let free = find_available_rooms("1", 45, &without_self, &rooms(), &index());
        assert_eq!(free.len(), 4);
    }
}
