use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::handlers::lessons::{lesson_json, place_on_grid};
use crate::ipc::handlers::setup::Grid;
use crate::ipc::helpers::{db_conn, parse_opt_i64, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};
use timetabled::annotate::annotate_all;
use timetabled::conflicts::{conflict_kinds, find_all_conflicts};
use timetabled::model::AnnotatedLesson;
use timetabled::rooms::find_available_rooms;
use timetabled::timegrid::{is_half_hour_start, is_hour_start, validate_duration};

fn annotated_lessons(conn: &Connection, grid: &Grid) -> anyhow::Result<Vec<AnnotatedLesson>> {
    Ok(annotate_all(store::load_lessons(conn)?, &grid.index))
}

fn time_slots_json(grid: &Grid) -> JsonValue {
    let window = &grid.setup.window;
    let hour_marks: Vec<usize> = (0..grid.slots.len())
        .filter(|i| is_hour_start(window, *i))
        .collect();
    let half_hour_marks: Vec<usize> = (0..grid.slots.len())
        .filter(|i| is_half_hour_start(window, *i) && !is_hour_start(window, *i))
        .collect();
    json!({
        "dayStart": window.start_label(),
        "dayEnd": window.end_label(),
        "timeSlots": grid.slots,
        "hourMarks": hour_marks,
        "halfHourMarks": half_hour_marks
    })
}

fn handle_time_slots(state: &mut AppState, req: &Request) -> JsonValue {
    let grid = match state.db.as_ref() {
        Some(conn) => Grid::load(conn),
        None => Grid::from_defaults(),
    };
    ok(&req.id, time_slots_json(&grid))
}

fn load_schedule(conn: &Connection, grid: &Grid) -> anyhow::Result<JsonValue> {
    let (placed, skipped) = place_on_grid(grid, store::load_lessons(conn)?);
    let lessons: Vec<JsonValue> = placed.iter().map(|l| lesson_json(grid, l)).collect();
    Ok(json!({
        "groups": store::load_groups(conn)?,
        "timeSlots": grid.slots,
        "lessons": lessons,
        "subjects": store::load_subjects(conn)?,
        "teachers": store::load_teachers(conn)?,
        "assistants": store::load_assistants(conn)?,
        "rooms": store::load_rooms(conn)?,
        "skippedLessonIds": skipped
    }))
}

fn handle_schedule_load(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grid = Grid::load(conn);
    match load_schedule(conn, &grid) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_schedule_conflicts(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grid = Grid::load(conn);
    let lessons = match annotated_lessons(conn, &grid) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let map = find_all_conflicts(&lessons);
    let summary: Vec<JsonValue> = map
        .keys()
        .map(|id| json!({ "lessonId": id, "kinds": conflict_kinds(&map, id) }))
        .collect();
    ok(&req.id, json!({ "conflicts": map, "summary": summary }))
}

fn handle_rooms_available(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let time_slot = match required_str(req, "timeSlot") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grid = Grid::load(conn);
    let duration = match parse_opt_i64(req.params.get("duration")) {
        Ok(v) => v.unwrap_or(grid.setup.default_duration_minutes),
        Err(msg) => return err(&req.id, "bad_params", format!("duration {}", msg), None),
    };
    if let Err(e) = validate_duration(duration, &grid.setup.window) {
        return schedule_err(&req.id, &e);
    }
    let exclude = match parse_opt_string(req.params.get("excludeLessonId")) {
        Ok(v) => v,
        Err(msg) => {
            return err(&req.id, "bad_params", format!("excludeLessonId {}", msg), None)
        }
    };

    let lessons = match annotated_lessons(conn, &grid) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    // The lesson being edited must not block its own room.
    let lessons: Vec<AnnotatedLesson> = match exclude.as_deref() {
        Some(id) => lessons.into_iter().filter(|l| l.id() != id).collect(),
        None => lessons,
    };
    let rooms = match store::load_rooms(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let available = find_available_rooms(&time_slot, duration, &lessons, &rooms, &grid.index);
    ok(&req.id, json!({ "rooms": available }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "schedule.timeSlots" => Some(handle_time_slots(state, req)),
        "schedule.load" => Some(handle_schedule_load(state, req)),
        "schedule.conflicts" => Some(handle_schedule_conflicts(state, req)),
        "rooms.available" => Some(handle_rooms_available(state, req)),
        _ => None,
    }
}
