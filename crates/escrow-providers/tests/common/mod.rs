// crates/escrow-providers/tests/common/mod.rs
// ============================================================================
// Module: Provider Test Helpers
// Description: Scripted local HTTP servers for provider tests.
// ============================================================================
//! ## Overview
//! Spawns a `tiny_http` server that answers a fixed script of responses and
//! captures each request for later assertions.

use std::collections::BTreeSet;
use std::thread;
use std::thread::JoinHandle;

use escrow_providers::HttpClientConfig;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Request observed by the scripted server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub url: String,
    /// Idempotency header value, when present.
    pub idempotency_key: Option<String>,
    /// Parsed JSON body.
    pub body: serde_json::Value,
}

/// Scripted server handle.
pub struct ScriptedServer {
    /// Base URL of the server.
    pub base_url: String,
    /// Worker returning captured requests once the script is exhausted.
    pub handle: JoinHandle<Vec<CapturedRequest>>,
}

impl ScriptedServer {
    /// Waits for the script to finish and returns captured requests.
    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle.join().unwrap()
    }
}

/// Starts a server answering each scripted `(status, body)` in order.
pub fn scripted_server(script: Vec<(u16, String)>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, body) in script {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            let idempotency_key = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Idempotency-Key"))
                .map(|header| header.value.as_str().to_string());
            captured.push(CapturedRequest {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                idempotency_key,
                body: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
            });
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(body).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
        captured
    });
    ScriptedServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

/// Builds a client config that permits the local test server.
pub fn local_config(endpoint: &str) -> HttpClientConfig {
    let mut allowed_hosts = BTreeSet::new();
    allowed_hosts.insert("127.0.0.1".to_string());
    HttpClientConfig {
        endpoint: endpoint.to_string(),
        allow_http: true,
        allowed_hosts: Some(allowed_hosts),
        allow_private_networks: true,
        timeout_ms: 5_000,
        ..HttpClientConfig::default()
    }
}
