use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::handlers::setup::Grid;
use crate::ipc::helpers::{db_conn, parse_bool, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value as JsonValue};
use timetabled::annotate::{annotate, annotate_all, place};
use timetabled::conflicts::detect_conflicts;
use timetabled::model::{AnnotatedLesson, Lesson, LessonLabels, StaffRef};
use timetabled::timegrid::{fits_in_window, range_label, validate_duration};
use uuid::Uuid;

/// Serialized lesson for the grid: stored fields, position, display color and
/// the wall-clock range it covers.
pub fn lesson_json(grid: &Grid, lesson: &AnnotatedLesson) -> JsonValue {
    let mut v = serde_json::to_value(lesson).unwrap_or_default();
    if let Some(obj) = v.as_object_mut() {
        obj.insert(
            "displayColor".into(),
            JsonValue::String(lesson.lesson.display_color().to_string()),
        );
        obj.insert(
            "timeRange".into(),
            JsonValue::String(range_label(
                &grid.setup.window,
                lesson.start_slot_index,
                lesson.span,
            )),
        );
    }
    v
}

/// Annotates stored lessons against the grid. Lessons whose start slot is no
/// longer part of the slot table are returned by id instead.
pub fn place_on_grid(grid: &Grid, lessons: Vec<Lesson>) -> (Vec<AnnotatedLesson>, Vec<String>) {
    let mut placed = Vec::with_capacity(lessons.len());
    let mut skipped = Vec::new();
    for lesson in lessons {
        match grid.index.position(&lesson.time_slot) {
            Some(start) => placed.push(place(lesson, start)),
            None => skipped.push(lesson.id),
        }
    }
    if !skipped.is_empty() {
        tracing::warn!(count = skipped.len(), "lessons outside the current slot table");
    }
    (placed, skipped)
}

/// `params.input` of `lessons.create` and `lessons.validate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LessonInput {
    group_id: String,
    time_slot: String,
    subject_id: String,
    teacher_id: String,
    room_id: String,
    #[serde(default)]
    assistant_id: Option<String>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    additional_teacher_ids: Option<Vec<String>>,
    #[serde(default)]
    additional_assistant_ids: Option<Vec<String>>,
}

/// `params.patch` of `lessons.update`. For nullable fields the outer `Option`
/// is presence and the inner one is the value, so `null` clears.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LessonPatch {
    group_id: Option<String>,
    time_slot: Option<String>,
    subject_id: Option<String>,
    teacher_id: Option<String>,
    room_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    assistant_id: Option<Option<String>>,
    duration: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    color: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    comment: Option<Option<String>>,
    additional_teacher_ids: Option<Vec<String>>,
    additional_assistant_ids: Option<Vec<String>>,
}

fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn required_text(value: String, key: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} must be a non-empty string", key));
    }
    Ok(value.to_string())
}

/// Blank strings count as absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed, non-empty, first occurrence wins.
fn staff_list(ids: Option<Vec<String>>) -> Vec<StaffRef> {
    let mut out: Vec<StaffRef> = Vec::new();
    for id in ids.unwrap_or_default() {
        let id = id.trim();
        if !id.is_empty() && !out.iter().any(|s| s.id == id) {
            out.push(StaffRef::new(id));
        }
    }
    out
}

fn parse_lesson_input(input: &JsonValue, default_duration: i64) -> Result<Lesson, String> {
    let input = LessonInput::deserialize(input).map_err(|e| format!("input: {}", e))?;
    Ok(Lesson {
        id: String::new(),
        group_id: required_text(input.group_id, "groupId")?,
        time_slot: required_text(input.time_slot, "timeSlot")?,
        subject_id: required_text(input.subject_id, "subjectId")?,
        teacher_id: required_text(input.teacher_id, "teacherId")?,
        assistant_id: optional_text(input.assistant_id),
        room_id: required_text(input.room_id, "roomId")?,
        duration: input.duration.unwrap_or(default_duration),
        color: optional_text(input.color),
        comment: optional_text(input.comment),
        additional_teachers: staff_list(input.additional_teacher_ids),
        additional_assistants: staff_list(input.additional_assistant_ids),
        labels: LessonLabels::default(),
    })
}

fn apply_patch(lesson: &mut Lesson, patch: &JsonValue) -> Result<(), String> {
    let patch = LessonPatch::deserialize(patch).map_err(|e| format!("patch: {}", e))?;
    if let Some(v) = patch.group_id {
        lesson.group_id = required_text(v, "groupId")?;
    }
    if let Some(v) = patch.time_slot {
        lesson.time_slot = required_text(v, "timeSlot")?;
    }
    if let Some(v) = patch.subject_id {
        lesson.subject_id = required_text(v, "subjectId")?;
    }
    if let Some(v) = patch.teacher_id {
        lesson.teacher_id = required_text(v, "teacherId")?;
    }
    if let Some(v) = patch.room_id {
        lesson.room_id = required_text(v, "roomId")?;
    }
    if let Some(v) = patch.assistant_id {
        lesson.assistant_id = optional_text(v);
    }
    if let Some(v) = patch.duration {
        lesson.duration = v;
    }
    if let Some(v) = patch.color {
        lesson.color = optional_text(v);
    }
    if let Some(v) = patch.comment {
        lesson.comment = optional_text(v);
    }
    if patch.additional_teacher_ids.is_some() {
        lesson.additional_teachers = staff_list(patch.additional_teacher_ids);
    }
    if patch.additional_assistant_ids.is_some() {
        lesson.additional_assistants = staff_list(patch.additional_assistant_ids);
    }
    Ok(())
}

/// Checks a lesson against the workspace and positions it on the grid.
/// Errors are finished IPC responses.
fn prepare_candidate(
    conn: &Connection,
    req: &Request,
    grid: &Grid,
    mut lesson: Lesson,
) -> Result<AnnotatedLesson, JsonValue> {
    validate_duration(lesson.duration, &grid.setup.window)
        .map_err(|e| schedule_err(&req.id, &e))?;
    let start = grid
        .index
        .require(&lesson.time_slot)
        .map_err(|e| schedule_err(&req.id, &e))?;
    if lesson
        .additional_teachers
        .iter()
        .any(|t| t.id == lesson.teacher_id)
    {
        return Err(err(
            &req.id,
            "bad_params",
            "additionalTeacherIds must not repeat teacherId",
            None,
        ));
    }
    match store::missing_reference(conn, &lesson) {
        Ok(Some(key)) => {
            return Err(err(
                &req.id,
                "bad_params",
                format!("unknown {}", key),
                None,
            ))
        }
        Ok(None) => {}
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
    store::fill_labels(conn, &mut lesson)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok(place(lesson, start))
}

fn existing_lessons(
    conn: &Connection,
    req: &Request,
    grid: &Grid,
) -> Result<Vec<AnnotatedLesson>, JsonValue> {
    store::load_lessons(conn)
        .map(|lessons| annotate_all(lessons, &grid.index))
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

#[derive(Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
}

/// Runs the conflict check and persists unless it found conflicts and the
/// caller did not force the write.
fn check_and_save(
    conn: &Connection,
    req: &Request,
    lesson: Lesson,
    mode: WriteMode,
) -> JsonValue {
    let force = match parse_bool(req.params.get("force"), false) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("force {}", msg), None),
    };
    let grid = Grid::load(conn);
    let candidate = match prepare_candidate(conn, req, &grid, lesson) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let existing = match existing_lessons(conn, req, &grid) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let conflicts = detect_conflicts(&candidate, &existing);
    if !conflicts.is_empty() {
        if !force {
            tracing::info!(
                lesson_id = %candidate.id(),
                conflicts = conflicts.len(),
                "lesson write held back by conflicts"
            );
            return ok(&req.id, json!({ "saved": false, "conflicts": conflicts }));
        }
        tracing::warn!(
            lesson_id = %candidate.id(),
            conflicts = conflicts.len(),
            "saving lesson despite conflicts"
        );
    }

    let written = match mode {
        WriteMode::Insert => store::insert_lesson(conn, &candidate.lesson),
        WriteMode::Update => store::update_lesson(conn, &candidate.lesson),
    };
    if let Err(e) = written {
        let code = match mode {
            WriteMode::Insert => "db_insert_failed",
            WriteMode::Update => "db_update_failed",
        };
        return err(&req.id, code, e.to_string(), Some(json!({ "table": "lessons" })));
    }

    ok(
        &req.id,
        json!({
            "saved": true,
            "lessonId": candidate.id(),
            "lesson": lesson_json(&grid, &candidate),
            "conflicts": conflicts
        }),
    )
}

fn load_for_edit(conn: &Connection, req: &Request) -> Result<Lesson, JsonValue> {
    let lesson_id = required_str(req, "lessonId")?;
    match store::load_lesson(conn, &lesson_id) {
        Ok(Some(l)) => Ok(l),
        Ok(None) => Err(err(&req.id, "not_found", "lesson not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_lessons_list(state: &mut AppState, req: &Request) -> JsonValue {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "lessons": [], "skippedLessonIds": [] }));
    };
    let grid = Grid::load(conn);
    let lessons = match store::load_lessons(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let (placed, skipped) = place_on_grid(&grid, lessons);
    let rows: Vec<JsonValue> = placed.iter().map(|l| lesson_json(&grid, l)).collect();
    ok(&req.id, json!({ "lessons": rows, "skippedLessonIds": skipped }))
}

fn handle_lessons_get(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson = match load_for_edit(conn, req) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let grid = Grid::load(conn);
    let fallback = serde_json::to_value(&lesson).unwrap_or_default();
    let body = match annotate(lesson, &grid.index) {
        Some(a) => lesson_json(&grid, &a),
        None => fallback,
    };
    ok(&req.id, json!({ "lesson": body }))
}

fn handle_lessons_validate(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grid = Grid::load(conn);
    let input = req.params.get("input").cloned().unwrap_or(JsonValue::Null);
    let mut lesson = match parse_lesson_input(&input, grid.setup.default_duration_minutes) {
        Ok(l) => l,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    lesson.id = match parse_opt_string(req.params.get("lessonId")) {
        Ok(id) => id.unwrap_or_default(),
        Err(msg) => return err(&req.id, "bad_params", format!("lessonId {}", msg), None),
    };
    let candidate = match prepare_candidate(conn, req, &grid, lesson) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let existing = match existing_lessons(conn, req, &grid) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let conflicts = detect_conflicts(&candidate, &existing);
    ok(
        &req.id,
        json!({
            "startSlotIndex": candidate.start_slot_index,
            "endSlotIndex": candidate.end_slot_index,
            "fitsInDay": fits_in_window(
                &grid.setup.window,
                candidate.start_slot_index,
                candidate.span
            ),
            "conflicts": conflicts
        }),
    )
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let default_duration = Grid::load(conn).setup.default_duration_minutes;
    let input = req.params.get("input").cloned().unwrap_or(JsonValue::Null);
    let mut lesson = match parse_lesson_input(&input, default_duration) {
        Ok(l) => l,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    lesson.id = Uuid::new_v4().to_string();
    check_and_save(conn, req, lesson, WriteMode::Insert)
}

fn handle_lessons_update(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    if patch.as_object().is_some_and(|p| p.is_empty()) {
        return err(&req.id, "bad_params", "patch must not be empty", None);
    }
    let mut lesson = match load_for_edit(conn, req) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    if let Err(msg) = apply_patch(&mut lesson, patch) {
        return err(&req.id, "bad_params", msg, None);
    }
    check_and_save(conn, req, lesson, WriteMode::Update)
}

fn handle_lessons_move(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let group_id = match required_str(req, "groupId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let time_slot = match required_str(req, "timeSlot") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut lesson = match load_for_edit(conn, req) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    if lesson.group_id == group_id && lesson.time_slot == time_slot {
        return err(&req.id, "no_change", "lesson is already in this cell", None);
    }
    lesson.group_id = group_id;
    lesson.time_slot = time_slot;
    check_and_save(conn, req, lesson, WriteMode::Update)
}

fn handle_lessons_resize(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(duration) = req.params.get("duration").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "duration must be integer", None);
    };
    let mut lesson = match load_for_edit(conn, req) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    lesson.duration = duration;
    check_and_save(conn, req, lesson, WriteMode::Update)
}

fn handle_lessons_delete(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_lesson(conn, &lesson_id) {
        Ok(true) => {
            tracing::info!(lesson_id = %lesson_id, "lesson deleted");
            ok(&req.id, json!({ "deleted": true }))
        }
        Ok(false) => err(&req.id, "not_found", "lesson not found", None),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "lessons.list" => Some(handle_lessons_list(state, req)),
        "lessons.get" => Some(handle_lessons_get(state, req)),
        "lessons.validate" => Some(handle_lessons_validate(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.update" => Some(handle_lessons_update(state, req)),
        "lessons.move" => Some(handle_lessons_move(state, req)),
        "lessons.resize" => Some(handle_lessons_resize(state, req)),
        "lessons.delete" => Some(handle_lessons_delete(state, req)),
        _ => None,
    }
}
