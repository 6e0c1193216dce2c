use crate::grade::grade_of;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    exam_type_param, marks_err, required_str, student_key_param, workspace, workspace_mut,
};
use crate::ipc::types::{AppState, Request};
use crate::marks::{MarksCandidate, Subject};
use crate::students::StudentId;
use serde_json::json;
use std::collections::BTreeMap;

/// Reads `params.scores` as `{ "<subject>": <whole number> }`. Range and
/// completeness are checked when the record is built.
fn scores_param(req: &Request) -> Result<BTreeMap<Subject, u32>, serde_json::Value> {
    let Some(obj) = req.params.get("scores").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "missing scores", None));
    };
    let mut scores = BTreeMap::new();
    for (name, value) in obj {
        let Some(subject) = Subject::parse(name) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("unknown subject: {}", name),
                Some(json!({ "subject": name })),
            ));
        };
        let Some(score) = value.as_u64().and_then(|v| u32::try_from(v).ok()) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a whole number", subject),
                Some(json!({ "subject": subject })),
            ));
        };
        if scores.insert(subject, score).is_some() {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} given more than once", subject),
                Some(json!({ "subject": subject })),
            ));
        }
    }
    Ok(scores)
}

fn handle_marks_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => StudentId::new(&v),
        Err(e) => return e,
    };
    let exam_type = match exam_type_param(req, "examType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scores = match scores_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let Some(student) = ws.students.find(&student_id) else {
        return err(
            &req.id,
            "not_found",
            "student not found",
            Some(json!({ "studentId": student_id })),
        );
    };
    let student_key = match student.student_key() {
        Ok(v) => v,
        Err(e) => return marks_err(req, &e),
    };
    let candidate = MarksCandidate {
        student_key,
        student_name: student.name.clone(),
        class_name: student.class_name.clone(),
        exam_type,
        scores,
    };

    match ws.marks.upsert(&ws.conn, candidate) {
        Ok((outcome, record)) => ok(&req.id, json!({ "outcome": outcome, "record": record })),
        Err(e) => marks_err(req, &e),
    }
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match student_key_param(req, "studentKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_type = match exam_type_param(req, "examType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.marks.delete(&ws.conn, &key, exam_type) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => marks_err(req, &e),
    }
}

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match workspace(state, req) {
        Ok(ws) => ok(&req.id, json!({ "records": ws.marks.all() })),
        Err(e) => e,
    }
}

fn handle_marks_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match student_key_param(req, "studentKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match workspace(state, req) {
        Ok(ws) => ok(&req.id, json!({ "records": ws.marks.find_by_student(&key) })),
        Err(e) => e,
    }
}

fn handle_marks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match student_key_param(req, "studentKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_type = match exam_type_param(req, "examType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ws.marks.find_one(&key, exam_type) {
        Some(record) => ok(&req.id, json!({ "record": record })),
        None => err(
            &req.id,
            "not_found",
            "marks record not found",
            Some(json!({ "studentKey": key, "examType": exam_type })),
        ),
    }
}

fn handle_grade_of(req: &Request) -> serde_json::Value {
    let Some(percentage) = req.params.get("percentage").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing percentage", None);
    };
    let grade = grade_of(percentage);
    ok(
        &req.id,
        json!({ "grade": grade, "pass": grade.is_pass() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.upsert" => Some(handle_marks_upsert(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.byStudent" => Some(handle_marks_by_student(state, req)),
        "marks.get" => Some(handle_marks_get(state, req)),
        "grade.of" => Some(handle_grade_of(req)),
        _ => None,
    }
}
