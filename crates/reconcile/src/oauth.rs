//! OAuth requirement heuristic for MCP servers.
//!
//! Best-effort classification, not a security boundary: a remote server
//! whose env and header keys carry nothing that looks like a credential is
//! assumed to need interactive authorization in the host. Such servers are
//! never added automatically.

use crate::types::McpServer;

const ENV_CREDENTIAL_MARKERS: &[&str] = &["token", "key", "auth", "secret"];
const HEADER_CREDENTIAL_MARKERS: &[&str] = &["authorization", "auth", "token"];

/// Whether a declared server must be authorized manually.
///
/// Stdio servers never require OAuth. HTTP and SSE servers require it
/// unless an env key or header key contains a credential marker
/// (case-insensitive).
pub fn server_requires_oauth(server: &McpServer) -> bool {
    if !server.transport.is_http_based() {
        return false;
    }

    let env_credential = server
        .env
        .keys()
        .any(|key| contains_marker(key, ENV_CREDENTIAL_MARKERS));
    let header_credential = server
        .headers
        .keys()
        .any(|key| contains_marker(key, HEADER_CREDENTIAL_MARKERS));

    !(env_credential || header_credential)
}

fn contains_marker(key: &str, markers: &[&str]) -> bool {
    let key = key.to_lowercase();
    markers.iter().any(|marker| key.contains(marker))
}
