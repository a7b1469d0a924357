mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{create_ref, error_code, request, request_ok, spawn_sidecar, temp_dir};

fn seed_input(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    json!({
        "groupId": create_ref(stdin, reader, "s1", "groups", json!({ "name": "1A" })),
        "subjectId": create_ref(stdin, reader, "s2", "subjects", json!({ "name": "Math" })),
        "teacherId": create_ref(stdin, reader, "s3", "teachers", json!({ "name": "Ada" })),
        "roomId": create_ref(stdin, reader, "s4", "rooms", json!({ "name": "R1" })),
        "timeSlot": "1",
        "duration": 45
    })
}

#[test]
fn durations_beyond_the_day_are_rejected_and_workspace_stays_usable() {
    let workspace = temp_dir("timetabled-lesson-bounds");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let base = seed_input(&mut stdin, &mut reader);

    for (i, minutes) in [4_294_967_295_i64, 575, 9_223_372_036_854_775_805]
        .into_iter()
        .enumerate()
    {
        let mut input = base.clone();
        input["duration"] = json!(minutes);
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("huge-{}", i),
            "lessons.create",
            json!({ "input": input }),
        );
        assert_eq!(error_code(&resp), Some("bad_params"), "{} minutes", minutes);
        assert_eq!(resp["error"]["details"]["kind"], "invalid_duration");
    }

    let listed = request_ok(&mut stdin, &mut reader, "2", "lessons.list", json!({}));
    assert_eq!(listed["lessons"], json!([]));

    // The whole day is the longest allowed lesson.
    let mut input = base.clone();
    input["duration"] = json!(570);
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.create",
        json!({ "input": input }),
    );
    assert_eq!(created["lesson"]["timeRange"], "08:30-18:00");
    let lesson_id = created["lessonId"].as_str().expect("lessonId").to_string();

    let resized = request(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.resize",
        json!({ "lessonId": lesson_id, "duration": 4_294_967_295_i64 }),
    );
    assert_eq!(error_code(&resized), Some("bad_params"));

    let rooms = request(
        &mut stdin,
        &mut reader,
        "5",
        "rooms.available",
        json!({ "timeSlot": "1", "duration": 4_294_967_295_i64 }),
    );
    assert_eq!(error_code(&rooms), Some("bad_params"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn oversized_rows_already_on_disk_still_load() {
    let workspace = temp_dir("timetabled-lesson-bounds-stored");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let input = seed_input(&mut stdin, &mut reader);
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.create",
        json!({ "input": input }),
    );
    let lesson_id = created["lessonId"].as_str().expect("lessonId").to_string();

    let conn = rusqlite::Connection::open(workspace.join("timetable.sqlite3")).expect("open db");
    conn.execute(
        "UPDATE lessons SET duration = ? WHERE id = ?",
        rusqlite::params![i64::MAX, lesson_id],
    )
    .expect("update duration");
    drop(conn);

    let listed = request_ok(&mut stdin, &mut reader, "3", "lessons.list", json!({}));
    assert_eq!(listed["lessons"][0]["id"], lesson_id.as_str());
    assert!(listed["lessons"][0]["timeRange"]
        .as_str()
        .is_some_and(|r| r.starts_with("08:30-")));
    let _ = request_ok(&mut stdin, &mut reader, "4", "schedule.load", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "5", "schedule.conflicts", json!({}));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn validate_reports_lessons_running_past_the_day() {
    let workspace = temp_dir("timetabled-lesson-fit");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mut input = seed_input(&mut stdin, &mut reader);

    let fits = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.validate",
        json!({ "input": input.clone() }),
    );
    assert_eq!(fits["fitsInDay"], true);

    input["timeSlot"] = json!("114");
    input["duration"] = json!(60);
    let late = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.validate",
        json!({ "input": input }),
    );
    assert_eq!(late["fitsInDay"], false);
    assert_eq!(late["startSlotIndex"], 113);
    assert_eq!(late["endSlotIndex"], 124);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn lesson_params_are_typed() {
    let workspace = temp_dir("timetabled-lesson-typed");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let input = seed_input(&mut stdin, &mut reader);

    let mut extra = input.clone();
    extra["teacher"] = json!("Ada");
    let unknown = request(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.create",
        json!({ "input": extra }),
    );
    assert_eq!(error_code(&unknown), Some("bad_params"));

    let mut stringly = input.clone();
    stringly["duration"] = json!("45");
    let bad_type = request(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.create",
        json!({ "input": stringly }),
    );
    assert_eq!(error_code(&bad_type), Some("bad_params"));

    let mut blank = input.clone();
    blank["roomId"] = json!("  ");
    let blank_resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.create",
        json!({ "input": blank }),
    );
    assert_eq!(error_code(&blank_resp), Some("bad_params"));

    let mut commented = input.clone();
    commented["comment"] = json!("bring lab coats");
    commented["color"] = json!("#123456");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.create",
        json!({ "input": commented }),
    );
    let lesson_id = created["lessonId"].as_str().expect("lessonId").to_string();
    assert_eq!(created["lesson"]["displayColor"], "#123456");

    // null clears a nullable field; an absent field is left alone.
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lessons.update",
        json!({ "lessonId": lesson_id, "patch": { "comment": null } }),
    );
    assert!(cleared["lesson"].get("comment").is_none());
    assert_eq!(cleared["lesson"]["color"], "#123456");

    let bad_patch = request(
        &mut stdin,
        &mut reader,
        "7",
        "lessons.update",
        json!({ "lessonId": lesson_id, "patch": { "teacher": "Ada" } }),
    );
    assert_eq!(error_code(&bad_patch), Some("bad_params"));

    let blank_group = request(
        &mut stdin,
        &mut reader,
        "8",
        "lessons.update",
        json!({ "lessonId": lesson_id, "patch": { "groupId": "" } }),
    );
    assert_eq!(error_code(&blank_group), Some("bad_params"));

    let _ = std::fs::remove_dir_all(workspace);
}
