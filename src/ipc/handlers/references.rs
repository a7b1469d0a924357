use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_opt_i64, parse_opt_string, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;
use timetabled::model::DEFAULT_LESSON_COLOR;
use uuid::Uuid;

/// The reference tables lessons point at. They share one CRUD surface.
#[derive(Clone, Copy, Debug)]
enum RefKind {
    Groups,
    Subjects,
    Teachers,
    Assistants,
    Rooms,
}

impl RefKind {
    fn parse(prefix: &str) -> Option<Self> {
        match prefix {
            "groups" => Some(Self::Groups),
            "subjects" => Some(Self::Subjects),
            "teachers" => Some(Self::Teachers),
            "assistants" => Some(Self::Assistants),
            "rooms" => Some(Self::Rooms),
            _ => None,
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Subjects => "subjects",
            Self::Teachers => "teachers",
            Self::Assistants => "assistants",
            Self::Rooms => "rooms",
        }
    }

    fn id_key(self) -> &'static str {
        match self {
            Self::Groups => "groupId",
            Self::Subjects => "subjectId",
            Self::Teachers => "teacherId",
            Self::Assistants => "assistantId",
            Self::Rooms => "roomId",
        }
    }

    fn has_color(self) -> bool {
        matches!(self, Self::Subjects | Self::Teachers)
    }

    fn has_display_order(self) -> bool {
        matches!(self, Self::Groups | Self::Teachers)
    }

    /// (table, column) pairs that reference a row of this kind.
    fn usages(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Groups => &[("lessons", "group_id")],
            Self::Subjects => &[("lessons", "subject_id")],
            Self::Teachers => &[("lessons", "teacher_id"), ("lesson_teachers", "teacher_id")],
            Self::Assistants => &[
                ("lessons", "assistant_id"),
                ("lesson_assistants", "assistant_id"),
            ],
            Self::Rooms => &[("lessons", "room_id")],
        }
    }
}

fn list_json(conn: &Connection, kind: RefKind) -> anyhow::Result<serde_json::Value> {
    Ok(match kind {
        RefKind::Groups => serde_json::to_value(store::load_groups(conn)?)?,
        RefKind::Subjects => serde_json::to_value(store::load_subjects(conn)?)?,
        RefKind::Teachers => serde_json::to_value(store::load_teachers(conn)?)?,
        RefKind::Assistants => serde_json::to_value(store::load_assistants(conn)?)?,
        RefKind::Rooms => serde_json::to_value(store::load_rooms(conn)?)?,
    })
}

fn handle_list(state: &mut AppState, req: &Request, kind: RefKind) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ kind.table(): [] }));
    };
    match list_json(conn, kind) {
        Ok(rows) => ok(&req.id, json!({ kind.table(): rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn next_display_order(conn: &Connection, kind: RefKind) -> rusqlite::Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(display_order), 0) + 1 FROM {}",
        kind.table()
    );
    conn.query_row(&sql, [], |row| row.get(0))
}

/// Inserts one row. Subjects without a color get the default lesson color and
/// ordered kinds without an explicit order go to the end.
fn insert_row(
    conn: &Connection,
    kind: RefKind,
    name: &str,
    color: Option<String>,
    display_order: Option<i64>,
) -> rusqlite::Result<(String, Option<i64>)> {
    let id = Uuid::new_v4().to_string();
    let mut columns = vec!["id", "name"];
    let mut values = vec![Value::Text(id.clone()), Value::Text(name.to_string())];

    if kind.has_color() {
        let color = match (kind, color) {
            (RefKind::Subjects, None) => Some(DEFAULT_LESSON_COLOR.to_string()),
            (_, c) => c,
        };
        columns.push("color");
        values.push(color.map(Value::Text).unwrap_or(Value::Null));
    }
    let mut order = None;
    if kind.has_display_order() {
        let n = match display_order {
            Some(n) => n,
            None => next_display_order(conn, kind)?,
        };
        columns.push("display_order");
        values.push(Value::Integer(n));
        order = Some(n);
    }

    let sql = format!(
        "INSERT INTO {}({}) VALUES({})",
        kind.table(),
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok((id, order))
}

fn handle_create(state: &mut AppState, req: &Request, kind: RefKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let color = match parse_opt_string(req.params.get("color")) {
        Ok(v) if kind.has_color() => v,
        Ok(_) => None,
        Err(msg) => return err(&req.id, "bad_params", format!("color {}", msg), None),
    };
    let display_order = match parse_opt_i64(req.params.get("displayOrder")) {
        Ok(v) if kind.has_display_order() => v,
        Ok(_) => None,
        Err(msg) => return err(&req.id, "bad_params", format!("displayOrder {}", msg), None),
    };

    match insert_row(conn, kind, &name, color, display_order) {
        Ok((id, _)) => {
            tracing::info!(table = kind.table(), id = %id, "reference row created");
            ok(&req.id, json!({ kind.id_key(): id, "name": name }))
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        ),
    }
}

/// Blank names are skipped. Groups take their position in `names` (1-based)
/// as display order.
fn bulk_insert(
    conn: &Connection,
    kind: RefKind,
    names: &[String],
) -> rusqlite::Result<Vec<serde_json::Value>> {
    let tx = conn.unchecked_transaction()?;
    let mut created = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let order = match kind {
            RefKind::Groups => Some(i as i64 + 1),
            _ => None,
        };
        let (id, order) = insert_row(&tx, kind, name, None, order)?;
        let mut row = json!({ "id": id, "name": name });
        if let Some(n) = order {
            row["displayOrder"] = json!(n);
        }
        created.push(row);
    }
    tx.commit()?;
    Ok(created)
}

fn handle_bulk_create(state: &mut AppState, req: &Request, kind: RefKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let names: Vec<String> = match req.params.get("names").and_then(|v| v.as_array()) {
        Some(arr) if !arr.is_empty() => {
            match arr
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
            {
                Some(names) => names,
                None => return err(&req.id, "bad_params", "names must be strings", None),
            }
        }
        _ => return err(&req.id, "bad_params", "names must be a non-empty array", None),
    };

    match bulk_insert(conn, kind, &names) {
        Ok(created) => {
            tracing::info!(table = kind.table(), count = created.len(), "reference rows created");
            ok(&req.id, json!({ kind.table(): created }))
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": kind.table() })),
        ),
    }
}

fn handle_update(state: &mut AppState, req: &Request, kind: RefKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (k, v) in patch {
        match k.as_str() {
            "name" => {
                let name = v.as_str().map(str::trim).unwrap_or_default();
                if name.is_empty() {
                    return err(&req.id, "bad_params", "name must not be empty", None);
                }
                sets.push("name = ?");
                values.push(Value::Text(name.to_string()));
            }
            "color" if kind.has_color() => {
                let color = match parse_opt_string(Some(v)) {
                    Ok(c) => c,
                    Err(msg) => return err(&req.id, "bad_params", format!("color {}", msg), None),
                };
                if color.is_none() && matches!(kind, RefKind::Subjects) {
                    return err(&req.id, "bad_params", "subject color must not be empty", None);
                }
                sets.push("color = ?");
                values.push(color.map(Value::Text).unwrap_or(Value::Null));
            }
            "displayOrder" if kind.has_display_order() => {
                let Some(order) = v.as_i64() else {
                    return err(&req.id, "bad_params", "displayOrder must be integer", None);
                };
                sets.push("display_order = ?");
                values.push(Value::Integer(order));
            }
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown {} field: {}", kind.table(), k),
                    None,
                )
            }
        }
    }
    if sets.is_empty() {
        return err(&req.id, "bad_params", "patch must not be empty", None);
    }

    values.push(Value::Text(id.clone()));
    let sql = format!("UPDATE {} SET {} WHERE id = ?", kind.table(), sets.join(", "));
    match conn.execute(&sql, params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", format!("{} not found", kind.id_key()), None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn usage_count(conn: &Connection, kind: RefKind, id: &str) -> rusqlite::Result<i64> {
    let mut total = 0;
    for (table, column) in kind.usages() {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column);
        total += conn.query_row(&sql, [id], |row| row.get::<_, i64>(0))?;
    }
    Ok(total)
}

fn handle_delete(state: &mut AppState, req: &Request, kind: RefKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match usage_count(conn, kind, &id) {
        Ok(0) => {}
        Ok(n) => {
            return err(
                &req.id,
                "in_use",
                format!("{} is still used by scheduled lessons", kind.id_key()),
                Some(json!({ "references": n })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    match conn.execute(&sql, [&id]) {
        Ok(0) => err(&req.id, "not_found", format!("{} not found", kind.id_key()), None),
        Ok(_) => {
            tracing::info!(table = kind.table(), id = %id, "reference row deleted");
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (prefix, action) = req.method.split_once('.')?;
    let kind = RefKind::parse(prefix)?;
    match action {
        "list" => Some(handle_list(state, req, kind)),
        "create" => Some(handle_create(state, req, kind)),
        "bulkCreate" => Some(handle_bulk_create(state, req, kind)),
        "update" => Some(handle_update(state, req, kind)),
        "delete" => Some(handle_delete(state, req, kind)),
        _ => None,
    }
}
