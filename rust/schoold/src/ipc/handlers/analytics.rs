use crate::aggregate::{
    all_subject_statistics, cohort_statistics, student_analytics, subject_statistics,
    top_performers, DEFAULT_TOP_N,
};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{aggregate_err, optional_str, student_key_param, workspace};
use crate::ipc::types::{AppState, Request};
use crate::marks::Subject;
use serde_json::json;

fn handle_analytics_cohort(state: &mut AppState, req: &Request) -> serde_json::Value {
    match workspace(state, req) {
        Ok(ws) => ok(&req.id, json!({ "cohort": cohort_statistics(ws.marks.all()) })),
        Err(e) => e,
    }
}

fn handle_analytics_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject = match optional_str(req, "subject") {
        Ok(Some(raw)) => match Subject::parse(&raw) {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown subject: {}", raw),
                    Some(json!({ "allowed": Subject::ALL.map(|s| s.as_str()) })),
                )
            }
        },
        Ok(None) => None,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records = ws.marks.all();

    match subject {
        Some(subject) => match subject_statistics(records, subject) {
            Ok(stats) => ok(&req.id, json!({ "subject": subject, "stats": stats })),
            Err(e) => aggregate_err(req, &e),
        },
        None => match all_subject_statistics(records) {
            Ok(stats) => ok(&req.id, json!({ "subjects": stats })),
            Err(e) => aggregate_err(req, &e),
        },
    }
}

fn handle_analytics_top_performers(state: &mut AppState, req: &Request) -> serde_json::Value {
    let n = match req.params.get("n") {
        None | Some(serde_json::Value::Null) => DEFAULT_TOP_N,
        Some(v) => match v.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(n) => n,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "n must be a non-negative integer",
                    Some(json!({ "field": "n" })),
                )
            }
        },
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ranked: Vec<serde_json::Value> = top_performers(ws.marks.all(), n)
        .into_iter()
        .enumerate()
        .map(|(i, r)| json!({ "rank": i + 1, "record": r }))
        .collect();
    ok(&req.id, json!({ "performers": ranked }))
}

fn handle_analytics_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match student_key_param(req, "studentKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records = ws.marks.find_by_student(&key);
    // An unknown student is an empty result, not an error.
    ok(&req.id, json!({ "analytics": student_analytics(&records) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.cohort" => Some(handle_analytics_cohort(state, req)),
        "analytics.subjects" => Some(handle_analytics_subjects(state, req)),
        "analytics.topPerformers" => Some(handle_analytics_top_performers(state, req)),
        "analytics.student" => Some(handle_analytics_student(state, req)),
        _ => None,
    }
}
