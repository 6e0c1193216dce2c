use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::workspace::Workspace;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state
                .workspace
                .as_ref()
                .map(|w| w.path.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    // Release the previous database before opening another one.
    state.workspace = None;
    match Workspace::open(&path) {
        Ok(ws) => {
            let counts = json!({
                "students": ws.students.all().len(),
                "faculty": ws.faculty.all().len(),
                "marksRecords": ws.marks.all().len(),
            });
            state.workspace = Some(ws);
            ok(
                &req.id,
                json!({ "workspacePath": path.to_string_lossy(), "counts": counts }),
            )
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_admin_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if state.config.admin.matches(&username, &password) {
        tracing::info!("admin login accepted");
        ok(&req.id, json!({ "authenticated": true }))
    } else {
        tracing::info!("admin login rejected");
        err(&req.id, "unauthorized", "invalid admin credentials", None)
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "admin.login" => Some(handle_admin_login(state, req)),
        _ => None,
    }
}
