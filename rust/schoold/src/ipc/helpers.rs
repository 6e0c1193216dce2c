use crate::aggregate::AggregateError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::marks::{ExamType, MarksError, StudentKey};
use crate::roster::RosterError;
use crate::workspace::Workspace;
use serde_json::json;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a string", key), None)),
    }
}

pub fn workspace<'a>(state: &'a AppState, req: &Request) -> Result<&'a Workspace, serde_json::Value> {
    state
        .workspace
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn workspace_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut Workspace, serde_json::Value> {
    state
        .workspace
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn exam_type_param(req: &Request, key: &str) -> Result<ExamType, serde_json::Value> {
    let raw = required_str(req, key)?;
    ExamType::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown exam type: {}", raw),
            Some(json!({ "allowed": ExamType::ALL.map(|e| e.as_str()) })),
        )
    })
}

pub fn student_key_param(req: &Request, key: &str) -> Result<StudentKey, serde_json::Value> {
    let raw = required_str(req, key)?;
    StudentKey::new(&raw).map_err(|e| marks_err(req, &e))
}

pub fn marks_err(req: &Request, e: &MarksError) -> serde_json::Value {
    let details = match e {
        MarksError::Validation { field, .. } => Some(json!({ "field": field })),
        MarksError::Storage(_) => Some(json!({ "collection": crate::db::MARKS_KEY })),
    };
    err(&req.id, e.code(), e.to_string(), details)
}

pub fn roster_err(req: &Request, e: &RosterError) -> serde_json::Value {
    let details = match e {
        RosterError::Validation { field, .. } => Some(json!({ "field": field })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

pub fn aggregate_err(req: &Request, e: &AggregateError) -> serde_json::Value {
    let AggregateError::MissingSubject {
        student_key,
        exam_type,
        subject,
    } = e;
    err(
        &req.id,
        e.code(),
        e.to_string(),
        Some(json!({
            "studentKey": student_key,
            "examType": exam_type,
            "subject": subject,
        })),
    )
}
