use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use timetabled::model::{Assistant, Group, Lesson, LessonLabels, Room, StaffRef, Subject, Teacher};

pub fn load_groups(conn: &Connection) -> anyhow::Result<Vec<Group>> {
    let mut stmt =
        conn.prepare("SELECT id, name, display_order FROM groups ORDER BY display_order, name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                display_order: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_subjects(conn: &Connection) -> anyhow::Result<Vec<Subject>> {
    let mut stmt = conn.prepare("SELECT id, name, color FROM subjects ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Subject {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_teachers(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, color, display_order FROM teachers ORDER BY display_order, name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Teacher {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                display_order: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_assistants(conn: &Connection) -> anyhow::Result<Vec<Assistant>> {
    let mut stmt = conn.prepare("SELECT id, name FROM assistants ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Assistant {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_rooms(conn: &Connection) -> anyhow::Result<Vec<Room>> {
    let mut stmt = conn.prepare("SELECT id, name FROM rooms ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Room {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        group_id: row.get(1)?,
        time_slot: row.get(2)?,
        subject_id: row.get(3)?,
        teacher_id: row.get(4)?,
        assistant_id: row.get(5)?,
        room_id: row.get(6)?,
        duration: row.get(7)?,
        color: row.get(8)?,
        comment: row.get(9)?,
        additional_teachers: Vec::new(),
        additional_assistants: Vec::new(),
        labels: LessonLabels {
            group_name: row.get(10)?,
            subject_name: row.get(11)?,
            subject_color: row.get(12)?,
            teacher_name: row.get(13)?,
            teacher_color: row.get(14)?,
            assistant_name: row.get(15)?,
            room_name: row.get(16)?,
        },
    })
}

/// Lessons with their display labels and co-teaching staff. `None` loads all.
fn select_lessons(conn: &Connection, lesson_id: Option<&str>) -> anyhow::Result<Vec<Lesson>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.group_id, l.time_slot, l.subject_id, l.teacher_id, l.assistant_id,
                l.room_id, l.duration, l.color, l.comment,
                g.name, s.name, s.color, t.name, t.color, a.name, r.name
         FROM lessons l
         LEFT JOIN groups g ON g.id = l.group_id
         LEFT JOIN subjects s ON s.id = l.subject_id
         LEFT JOIN teachers t ON t.id = l.teacher_id
         LEFT JOIN assistants a ON a.id = l.assistant_id
         LEFT JOIN rooms r ON r.id = l.room_id
         WHERE (?1 IS NULL OR l.id = ?1)
         ORDER BY CAST(l.time_slot AS INTEGER), l.id",
    )?;
    let mut lessons = stmt
        .query_map(params![lesson_id], lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut teachers = staff_by_lesson(
        conn,
        "SELECT lt.lesson_id, t.id, t.name, t.color
         FROM lesson_teachers lt
         JOIN teachers t ON t.id = lt.teacher_id
         WHERE (?1 IS NULL OR lt.lesson_id = ?1)
         ORDER BY lt.lesson_id, lt.sort_order",
        lesson_id,
    )?;
    let mut assistants = staff_by_lesson(
        conn,
        "SELECT la.lesson_id, a.id, a.name, NULL
         FROM lesson_assistants la
         JOIN assistants a ON a.id = la.assistant_id
         WHERE (?1 IS NULL OR la.lesson_id = ?1)
         ORDER BY la.lesson_id, la.sort_order",
        lesson_id,
    )?;
    for lesson in &mut lessons {
        lesson.additional_teachers = teachers.remove(&lesson.id).unwrap_or_default();
        lesson.additional_assistants = assistants.remove(&lesson.id).unwrap_or_default();
    }
    Ok(lessons)
}

fn staff_by_lesson(
    conn: &Connection,
    sql: &str,
    lesson_id: Option<&str>,
) -> anyhow::Result<HashMap<String, Vec<StaffRef>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![lesson_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                StaffRef {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out: HashMap<String, Vec<StaffRef>> = HashMap::new();
    for (lesson_id, staff) in rows {
        out.entry(lesson_id).or_default().push(staff);
    }
    Ok(out)
}

pub fn load_lessons(conn: &Connection) -> anyhow::Result<Vec<Lesson>> {
    select_lessons(conn, None)
}

pub fn load_lesson(conn: &Connection, lesson_id: &str) -> anyhow::Result<Option<Lesson>> {
    Ok(select_lessons(conn, Some(lesson_id))?.into_iter().next())
}

fn exists(conn: &Connection, table: &str, id: &str) -> anyhow::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    Ok(conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// First reference on `lesson` that points at a missing row, as its param name.
pub fn missing_reference(conn: &Connection, lesson: &Lesson) -> anyhow::Result<Option<String>> {
    let required = [
        ("groups", "groupId", lesson.group_id.as_str()),
        ("subjects", "subjectId", lesson.subject_id.as_str()),
        ("teachers", "teacherId", lesson.teacher_id.as_str()),
        ("rooms", "roomId", lesson.room_id.as_str()),
    ];
    for (table, key, id) in required {
        if !exists(conn, table, id)? {
            return Ok(Some(key.to_string()));
        }
    }
    if let Some(assistant_id) = lesson.assistant_id.as_deref() {
        if !exists(conn, "assistants", assistant_id)? {
            return Ok(Some("assistantId".to_string()));
        }
    }
    for t in &lesson.additional_teachers {
        if !exists(conn, "teachers", &t.id)? {
            return Ok(Some(format!("additionalTeacherIds[{}]", t.id)));
        }
    }
    for a in &lesson.additional_assistants {
        if !exists(conn, "assistants", &a.id)? {
            return Ok(Some(format!("additionalAssistantIds[{}]", a.id)));
        }
    }
    Ok(None)
}

fn name_and_color(
    conn: &Connection,
    sql: &str,
    id: &str,
) -> anyhow::Result<Option<(String, Option<String>)>> {
    Ok(conn
        .query_row(sql, [id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?)
}

/// Fills display labels and staff names for a lesson that was not read through
/// [`load_lessons`], e.g. a candidate built from request params.
pub fn fill_labels(conn: &Connection, lesson: &mut Lesson) -> anyhow::Result<()> {
    let group = name_and_color(conn, "SELECT name, NULL FROM groups WHERE id = ?", &lesson.group_id)?;
    let subject = name_and_color(conn, "SELECT name, color FROM subjects WHERE id = ?", &lesson.subject_id)?;
    let teacher = name_and_color(conn, "SELECT name, color FROM teachers WHERE id = ?", &lesson.teacher_id)?;
    let room = name_and_color(conn, "SELECT name, NULL FROM rooms WHERE id = ?", &lesson.room_id)?;
    let assistant = match lesson.assistant_id.as_deref() {
        Some(id) => name_and_color(conn, "SELECT name, NULL FROM assistants WHERE id = ?", id)?,
        None => None,
    };

    lesson.labels = LessonLabels {
        group_name: group.map(|(n, _)| n),
        subject_name: subject.as_ref().map(|(n, _)| n.clone()),
        subject_color: subject.and_then(|(_, c)| c),
        teacher_name: teacher.as_ref().map(|(n, _)| n.clone()),
        teacher_color: teacher.and_then(|(_, c)| c),
        assistant_name: assistant.map(|(n, _)| n),
        room_name: room.map(|(n, _)| n),
    };

    for t in &mut lesson.additional_teachers {
        if let Some((name, color)) =
            name_and_color(conn, "SELECT name, color FROM teachers WHERE id = ?", &t.id)?
        {
            t.name = name;
            t.color = color;
        }
    }
    for a in &mut lesson.additional_assistants {
        if let Some((name, _)) =
            name_and_color(conn, "SELECT name, NULL FROM assistants WHERE id = ?", &a.id)?
        {
            a.name = name;
        }
    }
    Ok(())
}

fn write_staff(conn: &Connection, lesson: &Lesson) -> anyhow::Result<()> {
    conn.execute("DELETE FROM lesson_teachers WHERE lesson_id = ?", [&lesson.id])?;
    conn.execute("DELETE FROM lesson_assistants WHERE lesson_id = ?", [&lesson.id])?;
    for (i, t) in lesson.additional_teachers.iter().enumerate() {
        conn.execute(
            "INSERT INTO lesson_teachers(lesson_id, teacher_id, sort_order) VALUES(?, ?, ?)",
            (&lesson.id, &t.id, i as i64),
        )?;
    }
    for (i, a) in lesson.additional_assistants.iter().enumerate() {
        conn.execute(
            "INSERT INTO lesson_assistants(lesson_id, assistant_id, sort_order) VALUES(?, ?, ?)",
            (&lesson.id, &a.id, i as i64),
        )?;
    }
    Ok(())
}

pub fn insert_lesson(conn: &Connection, lesson: &Lesson) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO lessons(id, group_id, time_slot, subject_id, teacher_id, assistant_id,
                             room_id, duration, color, comment)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            lesson.id,
            lesson.group_id,
            lesson.time_slot,
            lesson.subject_id,
            lesson.teacher_id,
            lesson.assistant_id,
            lesson.room_id,
            lesson.duration,
            lesson.color,
            lesson.comment,
        ],
    )?;
    write_staff(&tx, lesson)?;
    tx.commit()?;
    Ok(())
}

pub fn update_lesson(conn: &Connection, lesson: &Lesson) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE lessons
         SET group_id = ?, time_slot = ?, subject_id = ?, teacher_id = ?, assistant_id = ?,
             room_id = ?, duration = ?, color = ?, comment = ?
         WHERE id = ?",
        params![
            lesson.group_id,
            lesson.time_slot,
            lesson.subject_id,
            lesson.teacher_id,
            lesson.assistant_id,
            lesson.room_id,
            lesson.duration,
            lesson.color,
            lesson.comment,
            lesson.id,
        ],
    )?;
    write_staff(&tx, lesson)?;
    tx.commit()?;
    Ok(())
}

/// Returns false when no such lesson existed.
pub fn delete_lesson(conn: &Connection, lesson_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM lesson_teachers WHERE lesson_id = ?", [lesson_id])?;
    tx.execute("DELETE FROM lesson_assistants WHERE lesson_id = ?", [lesson_id])?;
    let n = tx.execute("DELETE FROM lessons WHERE id = ?", [lesson_id])?;
    tx.commit()?;
    Ok(n > 0)
}
