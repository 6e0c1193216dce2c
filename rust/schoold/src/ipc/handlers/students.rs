use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, required_str, roster_err, workspace, workspace_mut};
use crate::ipc::types::{AppState, Request};
use crate::students::{StudentDraft, StudentId, StudentRoster, StudentSort};
use serde_json::json;

fn sort_param(req: &Request, key: &str, raw: &str) -> Result<StudentSort, serde_json::Value> {
    StudentSort::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be one of name, rollNo, class", key),
            Some(json!({ "field": key })),
        )
    })
}

fn draft_param(req: &Request) -> Result<StudentDraft, serde_json::Value> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid student fields: {e}"), None))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let search = match optional_str(req, "search") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let sort = match optional_str(req, "sort") {
        Ok(Some(raw)) => match sort_param(req, "sort", &raw) {
            Ok(v) => Some(v),
            Err(e) => return e,
        },
        Ok(None) => None,
        Err(e) => return e,
    };

    let mut students = ws.students.search(&search);
    if let Some(by) = sort {
        StudentRoster::sorted(&mut students, by);
    }
    ok(
        &req.id,
        json!({ "students": students, "total": ws.students.all().len() }),
    )
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft = match draft_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.students.create(&ws.conn, draft) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => StudentId::new(&v),
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
    match ws.students.update(&ws.conn, &student_id, draft) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => StudentId::new(&v),
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Marks keyed by the roll number are left in place.
    match ws.students.delete(&ws.conn, &student_id) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "student": removed })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_students_sort(state: &mut AppState, req: &Request) -> serde_json::Value {
    let by = match required_str(req, "by") {
        Ok(raw) => match sort_param(req, "by", &raw) {
            Ok(v) => v,
            Err(e) => return e,
        },
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.students.sort_in_place(&ws.conn, by) {
        Ok(()) => ok(&req.id, json!({ "students": ws.students.all() })),
        Err(e) => roster_err(req, &e),
    }
}

fn handle_students_lookup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.students.lookup_login(&username) {
        Some(student) => ok(&req.id, json!({ "student": student })),
        None => err(&req.id, "not_found", "student not found", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.sort" => Some(handle_students_sort(state, req)),
        "students.lookup" => Some(handle_students_lookup(state, req)),
        _ => None,
    }
}
