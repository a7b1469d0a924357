use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use timetabled::model::TimeSlot;
use timetabled::timegrid::{generate_time_slots, validate_duration, DayWindow, SlotIndex};

const TIMEGRID_KEY: &str = "setup.timegrid";
const DEFAULT_DURATION_MINUTES: i64 = 45;

#[derive(Clone, Debug)]
pub struct TimegridSetup {
    pub window: DayWindow,
    pub default_duration_minutes: i64,
}

fn default_timegrid() -> Value {
    let window = DayWindow::default();
    json!({
        "dayStart": window.start_label(),
        "dayEnd": window.end_label(),
        "defaultDurationMinutes": DEFAULT_DURATION_MINUTES
    })
}

fn load_timegrid_section(conn: &Connection) -> anyhow::Result<Value> {
    let mut merged = default_timegrid();
    if let Some(Value::Object(saved)) = db::settings_get_json(conn, TIMEGRID_KEY)? {
        if let Some(obj) = merged.as_object_mut() {
            for (k, v) in saved {
                obj.insert(k, v);
            }
        }
    }
    Ok(merged)
}

/// Stored grid settings, falling back to defaults for anything unreadable.
pub fn load_timegrid_setup(conn: &Connection) -> TimegridSetup {
    let obj = db::settings_get_json(conn, TIMEGRID_KEY)
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let window = match (
        obj.get("dayStart").and_then(|v| v.as_str()),
        obj.get("dayEnd").and_then(|v| v.as_str()),
    ) {
        (Some(start), Some(end)) => DayWindow::parse(start, end).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored day window is invalid; using default");
            DayWindow::default()
        }),
        _ => DayWindow::default(),
    };
    let default_duration_minutes = obj
        .get("defaultDurationMinutes")
        .and_then(|v| v.as_i64())
        .filter(|v| validate_duration(*v, &window).is_ok())
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    TimegridSetup {
        window,
        default_duration_minutes,
    }
}

/// The slot table of the current workspace and its lookup index.
pub struct Grid {
    pub setup: TimegridSetup,
    pub slots: Vec<TimeSlot>,
    pub index: SlotIndex,
}

impl Grid {
    pub fn load(conn: &Connection) -> Self {
        Self::from_setup(load_timegrid_setup(conn))
    }

    /// Grid used before any workspace is selected.
    pub fn from_defaults() -> Self {
        Self::from_setup(TimegridSetup {
            window: DayWindow::default(),
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
        })
    }

    fn from_setup(setup: TimegridSetup) -> Self {
        let slots = generate_time_slots(&setup.window);
        let index = SlotIndex::new(&slots);
        Self {
            setup,
            slots,
            index,
        }
    }
}

fn parse_hhmm_field(v: &Value, key: &str) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be a HH:MM string", key))?;
    timetabled::timegrid::parse_hhmm(s).map_err(|e| format!("{}: {}", key, e))?;
    Ok(s.trim().to_string())
}

fn merge_timegrid_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "dayStart" | "dayEnd" => {
                obj.insert(k.clone(), Value::String(parse_hhmm_field(v, k)?));
            }
            "defaultDurationMinutes" => {
                let n = v
                    .as_i64()
                    .ok_or_else(|| format!("{} must be integer", k))?;
                obj.insert(k.clone(), Value::from(n));
            }
            _ => return Err(format!("unknown timegrid field: {}", k)),
        }
    }

    let start = obj.get("dayStart").and_then(|v| v.as_str()).unwrap_or_default();
    let end = obj.get("dayEnd").and_then(|v| v.as_str()).unwrap_or_default();
    let window = DayWindow::parse(start, end).map_err(|e| e.to_string())?;
    let duration = obj
        .get("defaultDurationMinutes")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    validate_duration(duration, &window).map_err(|e| format!("defaultDurationMinutes: {}", e))?;
    Ok(())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match load_timegrid_section(conn) {
        Ok(timegrid) => ok(&req.id, json!({ "timegrid": timegrid })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    if section != "timegrid" {
        return err(&req.id, "bad_params", "unknown section", None);
    }
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_timegrid_section(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_timegrid_patch(&mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, TIMEGRID_KEY, &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(timegrid = %current, "timegrid settings updated");
    ok(&req.id, json!({ "timegrid": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
