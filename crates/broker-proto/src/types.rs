//! Wire-level request and response types.
//!
//! The request envelope is deliberately loose: `action` is read first and
//! everything else is kept as a raw [`serde_json::Value`] so that an
//! unrecognized action produces the wire-mandated `"Unknown action: <name>"`
//! message rather than a generic deserialization error from a tagged enum.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The full set of fields a request may legally carry, read loosely so the
/// dispatcher can decide per-action which are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
	pub action: String,
	#[serde(default)]
	pub instance_id: Option<String>,
	#[serde(default)]
	pub old_id: Option<String>,
	#[serde(default)]
	pub new_id: Option<String>,
	#[serde(default)]
	pub from_id: Option<String>,
	#[serde(default)]
	pub to_id: Option<String>,
	#[serde(default)]
	pub auth_token: Option<String>,
	#[serde(default)]
	pub session_token: Option<String>,
	#[serde(default)]
	pub message: Option<MessageBody>,
}

/// The content/data pair clients send and receive as `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
	pub content: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// A queued, delivered message as it appears in a `check` response.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
	pub from: String,
	pub to: String,
	pub timestamp: String,
	pub message: MessageBody,
}

/// An active instance as it appears in a `list` response.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
	pub id: String,
	pub last_seen: String,
}
