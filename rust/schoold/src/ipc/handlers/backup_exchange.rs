use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{workspace, workspace_mut};
use crate::ipc::types::{AppState, Request};
use crate::marks::Subject;
use crate::workspace::Workspace;
use serde_json::json;
use std::path::{Path, PathBuf};

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn path_param(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn write_file(req: &Request, out_path: &str, contents: String) -> Result<(), serde_json::Value> {
    let out = Path::new(out_path);
    let io_err = |e: std::io::Error| {
        err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        )
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(out, contents).map_err(io_err)
}

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let out = PathBuf::from(&out_path);
    let export = match backup::export_bundle(
        &out,
        ws.students.all(),
        ws.faculty.all(),
        ws.marks.all(),
    ) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    tracing::info!(path = %out_path, "workspace bundle exported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "counts": collection_counts(ws),
        }),
    )
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match path_param(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let incoming = match backup::read_bundle(&src) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "workspace bundle rejected");
            return err(
                &req.id,
                "bundle_invalid",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            );
        }
    };
    if let Err(e) = ws.replace_collections(incoming) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    tracing::info!(path = %in_path, "workspace bundle imported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "bundleFormat": backup::BUNDLE_FORMAT_V1,
            "counts": collection_counts(ws),
        }),
    )
}

fn collection_counts(ws: &Workspace) -> serde_json::Value {
    json!({
        "students": ws.students.all().len(),
        "faculty": ws.faculty.all().len(),
        "marksRecords": ws.marks.all().len(),
    })
}

fn handle_exchange_export_marks_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match path_param(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ws = match workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut csv = String::from("roll_no,student_name,class,exam_type");
    for subject in Subject::ALL {
        csv.push(',');
        csv.push_str(&csv_quote(subject.as_str()));
    }
    csv.push_str(",total,percentage,grade,recorded_at\n");

    let records = ws.marks.all();
    for r in records {
        let mut line = format!(
            "{},{},{},{}",
            csv_quote(r.student_key().as_str()),
            csv_quote(r.student_name()),
            csv_quote(r.class_name()),
            csv_quote(r.exam_type().as_str())
        );
        for subject in Subject::ALL {
            line.push(',');
            line.push_str(&r.score(subject).map(|v| v.to_string()).unwrap_or_default());
        }
        line.push_str(&format!(
            ",{},{:.2},{},{}\n",
            r.total(),
            r.percentage(),
            csv_quote(r.grade().label()),
            csv_quote(r.recorded_at())
        ));
        csv.push_str(&line);
    }

    if let Err(e) = write_file(req, &out_path, csv) {
        return e;
    }
    ok(
        &req.id,
        json!({ "ok": true, "rowsExported": records.len(), "path": out_path }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        "exchange.exportMarksCsv" => Some(handle_exchange_export_marks_csv(state, req)),
        _ => None,
    }
}
