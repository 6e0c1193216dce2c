use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, workspace, workspace_mut};
use crate::ipc::types::{AppState, Request};
use crate::legacy;
use crate::workspace::Collections;
use serde_json::json;
use std::path::PathBuf;

const IMPORT_SUMMARY_KEY: &str = "import.browserStorage";

fn handle_workspace_import_browser_storage(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !path.is_file() {
        return err(
            &req.id,
            "not_found",
            "storage dump not found",
            Some(json!({ "path": path.to_string_lossy() })),
        );
    }

    let parsed = match legacy::parse_browser_storage_file(&path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "legacy_parse_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };

    let incoming = Collections {
        students: parsed.students,
        faculty: parsed.faculty,
        marks: parsed.marks,
    };
    if let Err(e) = ws.replace_collections(incoming) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    let students = ws.students.all().len();
    let faculty = ws.faculty.all().len();
    let marks = ws.marks.all().len();

    let summary = json!({
        "sourcePath": path.to_string_lossy(),
        "importedAt": chrono::Utc::now().to_rfc3339(),
        "students": students,
        "faculty": faculty,
        "marksRecords": marks,
        "skipped": &parsed.skipped,
    });
    if let Err(e) = db::settings_set_json(&ws.conn, IMPORT_SUMMARY_KEY, &summary) {
        tracing::warn!(error = %format!("{e:#}"), "failed to record import summary");
    }
    tracing::info!(students, faculty, marks, skipped = parsed.skipped.len(), "browser storage imported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "students": students,
            "faculty": faculty,
            "marksRecords": marks,
            "skipped": &parsed.skipped,
        }),
    )
}

fn handle_workspace_last_browser_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::settings_get_json(&ws.conn, IMPORT_SUMMARY_KEY) {
        Ok(summary) => ok(&req.id, json!({ "summary": summary })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workspace.importBrowserStorage" => Some(handle_workspace_import_browser_storage(state, req)),
        "workspace.lastBrowserImport" => Some(handle_workspace_last_browser_import(state, req)),
        _ => None,
    }
}
