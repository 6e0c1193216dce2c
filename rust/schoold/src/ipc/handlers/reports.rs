use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{exam_type_param, student_key_param, workspace};
use crate::ipc::types::{AppState, Request};
use crate::reports::mark_sheet;
use serde_json::json;

fn handle_reports_mark_sheet_model(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let Some(record) = ws.marks.find_one(&key, exam_type) else {
        return err(
            &req.id,
            "not_found",
            "marks record not found",
            Some(json!({ "studentKey": key, "examType": exam_type })),
        );
    };
    match serde_json::to_value(mark_sheet(record)) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "server_error", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.markSheetModel" => Some(handle_reports_mark_sheet_model(state, req)),
        _ => None,
    }
}
