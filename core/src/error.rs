/// Machine-readable error codes shared by the dispatch layer and its logs.
/// The text envelope carries the human message; these codes travel in
/// structured log fields so failures can be grouped without parsing prose.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const SESSION_NOT_READY: &str = "session_not_ready";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const THREAD_STEP_FAILED: &str = "thread_step_failed";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const AUTHENTICATION_FAILED: &str = "authentication_failed";
}

/// Message used when an error carries no description of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred";
