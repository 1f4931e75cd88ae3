// crates/escrow-cli/tests/common/mod.rs
// ============================================================================
// Module: CLI Test Helpers
// Description: Binary runner, config writer, and scripted HTTP endpoints.
// ============================================================================
//! ## Overview
//! Runs the `escrow` binary against a temporary workspace. Remote oracle and
//! ledger endpoints are `tiny_http` servers answering a fixed script.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::thread;
use std::thread::JoinHandle;

use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Path of the compiled `escrow` binary.
pub fn escrow_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_escrow"))
}

/// Runs the binary with `--config <config>` followed by `args`.
pub fn run_escrow(config: &Path, args: &[&str]) -> Output {
    Command::new(escrow_bin())
        .env_remove("ESCROW_CONFIG")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("run escrow")
}

/// Runs the binary and parses stdout as JSON, failing on a non-zero exit.
pub fn run_json(config: &Path, args: &[&str]) -> Value {
    let output = run_escrow(config, args);
    assert!(
        output.status.success(),
        "escrow {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

/// Endpoint section for a local scripted server.
pub fn endpoint_section(name: &str, base_url: &str) -> String {
    format!(
        "[{name}]\nendpoint = \"{base_url}\"\nallow_http = true\nallow_private_networks = \
         true\nallowed_hosts = [\"127.0.0.1\"]\ntimeout_ms = 5000\n"
    )
}

/// Writes `contents` as `escrow.toml` under `dir`.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("escrow.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

/// Scripted server handle.
pub struct ScriptedServer {
    /// Base URL of the server.
    pub base_url: String,
    /// Worker returning the request paths once the script is exhausted.
    pub handle: JoinHandle<Vec<String>>,
}

impl ScriptedServer {
    /// Waits for the script to finish and returns the request paths.
    pub fn finish(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

/// Starts a server answering each scripted JSON body with status 200.
pub fn scripted_server(script: Vec<Value>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut paths = Vec::new();
        for body in script {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            paths.push(request.url().to_string());
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(body.to_string()).with_header(content_type);
            let _ = request.respond(response);
        }
        paths
    });
    ScriptedServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}
