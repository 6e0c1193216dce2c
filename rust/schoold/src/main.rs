mod aggregate;
mod backup;
mod config;
mod db;
mod faculty;
mod grade;
mod ipc;
mod legacy;
mod marks;
mod reports;
mod roster;
mod students;
mod workspace;

use serde_json::json;
use std::io::{self, BufRead, Write};

fn main() {
    config::init_tracing();
    let config = config::Config::from_env();

    let workspace = match config.workspace.as_deref() {
        Some(path) => match workspace::Workspace::open(path) {
            Ok(ws) => Some(ws),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to open workspace from environment");
                None
            }
        },
        None => None,
    };
    let mut state = ipc::AppState { config, workspace };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                // No id to echo back.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::debug!("stdin closed, exiting");
}
