use crate::faculty::{FacultyDraft, FacultyId};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, roster_err, workspace, workspace_mut};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn draft_param(req: &Request) -> Result<FacultyDraft, serde_json::Value> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid faculty fields: {e}"), None))
}

fn handle_faculty_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match workspace(state, req) {
        Ok(ws) => ok(&req.id, json!({ "faculty": ws.faculty.all() })),
        Err(e) => e,
    }
}

fn handle_faculty_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let faculty_id = match required_str(req, "facultyId") {
        Ok(v) => FacultyId::new(&v),
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.faculty.find(&faculty_id) {
        Some(member) => ok(&req.id, json!({ "member": member })),
        None => err(&req.id, "not_found", "faculty member not found", None),
    }
}

fn handle_faculty_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft = match draft_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.faculty.create(&ws.conn, draft) {
        Ok(member) => ok(&req.id, json!({ "member": member })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_faculty_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let faculty_id = match required_str(req, "facultyId") {
        Ok(v) => FacultyId::new(&v),
        Err(e) => return e,
    };
    let draft = match draft_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.faculty.update(&ws.conn, &faculty_id, draft) {
        Ok(member) => ok(&req.id, json!({ "member": member })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_faculty_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let faculty_id = match required_str(req, "facultyId") {
        Ok(v) => FacultyId::new(&v),
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.faculty.delete(&ws.conn, &faculty_id) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "member": removed })),
        Err(e) => roster_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "faculty.list" => Some(handle_faculty_list(state, req)),
        "faculty.get" => Some(handle_faculty_get(state, req)),
        "faculty.create" => Some(handle_faculty_create(state, req)),
        "faculty.update" => Some(handle_faculty_update(state, req)),
        "faculty.delete" => Some(handle_faculty_delete(state, req)),
        _ => None,
    }
}
