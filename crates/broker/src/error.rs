//! Error types.
//!
//! [`DispatchError`] messages are wire-visible by design: its `Display`
//! impl (derived via `thiserror`) produces the exact text `spec.md` §7
//! mandates, so a handler can propagate `err.to_string()` straight into a
//! `{"status":"error","message":...}` response. [`StoreError`] and
//! [`BrokerError`] are internal-only; persistence failures are logged, not
//! surfaced, per the Infrastructure row of the same table.

use thiserror::Error;

/// Errors that become the `message` field of an error response.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("Unknown action: {0}")]
	UnknownAction(String),

	#[error("missing required field: {0}")]
	MissingField(&'static str),

	#[error("Invalid instance ID format. Use 1-32 alphanumeric characters, hyphens, or underscores.")]
	InvalidInstanceId,

	#[error("Invalid recipient ID format")]
	InvalidRecipientId,

	#[error("Invalid new instance ID format")]
	InvalidNewInstanceId,

	#[error("Invalid or missing session token")]
	InvalidSession,

	#[error("Invalid auth token")]
	InvalidAuthToken,

	#[error("Rate limit exceeded. Please wait before sending more requests.")]
	RateLimited,

	#[error("Too many registration attempts. Please wait.")]
	RegistrationRateLimited,

	#[error("Rate limit: can rename again in {0} minutes")]
	RenameCooldown(i64),

	#[error("Instance {0} already exists")]
	InstanceExists(String),

	#[error("Instance {0} not found")]
	InstanceNotFound(String),

	#[error("Message queue full for {0} (100 message limit)")]
	QueueFull(String),

	#[error("failed to save message")]
	SpillFailed,
}

/// Internal persistence failures. Never surfaced verbatim to clients.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Db(#[from] rusqlite::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Broker-level setup failures (startup, not per-request).
#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("failed to create data directory {path}: {source}")]
	DataDir {
		path: std::path::PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: std::io::Error,
	},
}
