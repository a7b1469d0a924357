mod test_support;

use serde_json::json;
use test_support::{create_ref, error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn reference_rows_create_update_list_and_delete() {
    let workspace = temp_dir("timetabled-references");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let g2 = create_ref(&mut stdin, &mut reader, "2", "groups", json!({ "name": "2B" }));
    let g1 = create_ref(
        &mut stdin,
        &mut reader,
        "3",
        "groups",
        json!({ "name": "1A", "displayOrder": 0 }),
    );
    let groups = request_ok(&mut stdin, &mut reader, "4", "groups.list", json!({}));
    let ids: Vec<&str> = groups["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .filter_map(|g| g["id"].as_str())
        .collect();
    assert_eq!(ids, vec![g1.as_str(), g2.as_str()]);

    let subject = create_ref(&mut stdin, &mut reader, "5", "subjects", json!({ "name": "Math" }));
    let subjects = request_ok(&mut stdin, &mut reader, "6", "subjects.list", json!({}));
    assert_eq!(subjects["subjects"][0]["color"], "#667eea");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.update",
        json!({ "id": subject, "patch": { "name": "Mathematics", "color": "#ff0000" } }),
    );
    let subjects = request_ok(&mut stdin, &mut reader, "8", "subjects.list", json!({}));
    assert_eq!(subjects["subjects"][0]["name"], "Mathematics");
    assert_eq!(subjects["subjects"][0]["color"], "#ff0000");

    let bad_field = request(
        &mut stdin,
        &mut reader,
        "9",
        "rooms.update",
        json!({ "id": "x", "patch": { "color": "#000000" } }),
    );
    assert_eq!(error_code(&bad_field), Some("bad_params"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "10",
        "rooms.update",
        json!({ "id": "nope", "patch": { "name": "R" } }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let empty_name = request(&mut stdin, &mut reader, "11", "rooms.create", json!({ "name": "  " }));
    assert_eq!(error_code(&empty_name), Some("bad_params"));

    let _ = request_ok(&mut stdin, &mut reader, "12", "groups.delete", json!({ "id": g2 }));
    let gone = request(&mut stdin, &mut reader, "13", "groups.delete", json!({ "id": g2 }));
    assert_eq!(error_code(&gone), Some("not_found"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn referenced_rows_cannot_be_deleted() {
    let workspace = temp_dir("timetabled-references-in-use");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let group = create_ref(&mut stdin, &mut reader, "2", "groups", json!({ "name": "1A" }));
    let subject = create_ref(&mut stdin, &mut reader, "3", "subjects", json!({ "name": "Math" }));
    let teacher = create_ref(&mut stdin, &mut reader, "4", "teachers", json!({ "name": "Ada" }));
    let co = create_ref(&mut stdin, &mut reader, "5", "teachers", json!({ "name": "Grace" }));
    let room = create_ref(&mut stdin, &mut reader, "6", "rooms", json!({ "name": "R1" }));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "lessons.create",
        json!({ "input": {
            "groupId": group, "timeSlot": "1", "subjectId": subject,
            "teacherId": teacher, "roomId": room, "duration": 45,
            "additionalTeacherIds": [co]
        } }),
    );
    assert_eq!(created["saved"], true);

    for (i, (kind, id)) in [("rooms", &room), ("teachers", &co), ("groups", &group)]
        .into_iter()
        .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("del-{}", i),
            &format!("{}.delete", kind),
            json!({ "id": id }),
        );
        assert_eq!(error_code(&resp), Some("in_use"), "{} delete", kind);
        assert_eq!(resp["error"]["details"]["references"], 1);
    }

    let lesson_id = created["lessonId"].as_str().expect("lessonId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "lessons.delete",
        json!({ "lessonId": lesson_id }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "9", "teachers.delete", json!({ "id": co }));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bulk_create_skips_blank_names_and_orders_groups_by_position() {
    let workspace = temp_dir("timetabled-references-bulk");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let groups = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "groups.bulkCreate",
        json!({ "names": [" 1A ", "", "   ", "1D"] }),
    );
    let created = groups["groups"].as_array().expect("groups");
    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["name"], "1A");
    assert_eq!(created[0]["displayOrder"], 1);
    assert_eq!(created[1]["name"], "1D");
    assert_eq!(created[1]["displayOrder"], 4);
    assert!(created[0]["id"].as_str().is_some());

    let listed = request_ok(&mut stdin, &mut reader, "3", "groups.list", json!({}));
    let names: Vec<&str> = listed["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .filter_map(|g| g["name"].as_str())
        .collect();
    assert_eq!(names, vec!["1A", "1D"]);

    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.bulkCreate",
        json!({ "names": ["Math", "Art"] }),
    );
    assert_eq!(subjects["subjects"].as_array().map(|a| a.len()), Some(2));
    let listed = request_ok(&mut stdin, &mut reader, "5", "subjects.list", json!({}));
    assert!(listed["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .all(|s| s["color"] == "#667eea"));

    for (i, kind) in ["teachers", "assistants", "rooms"].into_iter().enumerate() {
        let resp = request_ok(
            &mut stdin,
            &mut reader,
            &format!("bulk-{}", i),
            &format!("{}.bulkCreate", kind),
            json!({ "names": ["One", "Two", ""] }),
        );
        assert_eq!(resp[kind].as_array().map(|a| a.len()), Some(2), "{}", kind);
    }

    let empty = request(
        &mut stdin,
        &mut reader,
        "6",
        "rooms.bulkCreate",
        json!({ "names": [] }),
    );
    assert_eq!(error_code(&empty), Some("bad_params"));

    let mixed = request(
        &mut stdin,
        &mut reader,
        "7",
        "rooms.bulkCreate",
        json!({ "names": ["R9", 9] }),
    );
    assert_eq!(error_code(&mixed), Some("bad_params"));
    let rooms = request_ok(&mut stdin, &mut reader, "8", "rooms.list", json!({}));
    assert_eq!(rooms["rooms"].as_array().map(|a| a.len()), Some(2));

    let _ = std::fs::remove_dir_all(workspace);
}
