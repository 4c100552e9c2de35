//! Shared constants for the editor engine.

// ── Reserved identifiers ────────────────────────────────────────

/// Wire identifier of the pseudo-bucket holding links not assigned to any topic.
pub const UNASSIGNED: &str = "unassigned";

/// Wire identifier of the trash drop zone. Never a real bucket.
pub const TRASH: &str = "trash";

/// Prefix of client-generated link identifiers awaiting a server id.
pub const TEMP_ID_PREFIX: &str = "temp-";

// ── Collision ───────────────────────────────────────────────────

/// Distances closer than this are treated as equal when ranking candidates.
pub const DISTANCE_EPSILON: f64 = 0.5;

// ── Configuration ───────────────────────────────────────────────

/// Env var holding the GraphQL endpoint URL.
pub const ENV_GRAPHQL_URL: &str = "CURATOR_GRAPHQL_URL";

/// Env var holding an optional bearer token for the GraphQL endpoint.
pub const ENV_API_TOKEN: &str = "CURATOR_API_TOKEN";

/// Env var overriding the whole-request timeout.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CURATOR_REQUEST_TIMEOUT_SECS";

/// Env var overriding the connect timeout.
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "CURATOR_CONNECT_TIMEOUT_SECS";

/// Env var declaring that the backend exposes a remove-from-topic mutation.
pub const ENV_SUPPORTS_UNASSIGN: &str = "CURATOR_SUPPORTS_UNASSIGN";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
