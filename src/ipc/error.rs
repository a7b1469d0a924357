use serde_json::json;
use timetabled::ScheduleError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Input-side scheduling errors are the caller's fault, so they surface as
/// `bad_params` with the precise kind in the details.
pub fn schedule_err(id: &str, e: &ScheduleError) -> serde_json::Value {
    err(id, "bad_params", e.to_string(), Some(json!({ "kind": e.code() })))
}
