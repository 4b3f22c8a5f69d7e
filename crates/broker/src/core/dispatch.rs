//! Request Dispatcher: parses the one request a connection carries,
//! authenticates and rate-limits it, rewrites any claimed identity to the
//! session-bound one, and routes to the matching handler.

use chrono::Utc;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{BrokerCore, names, queue, rate_limit, session, store};
use crate::error::DispatchError;
use broker_proto::types::RawRequest;

impl BrokerCore {
	/// Handle one already-parsed request and produce the JSON response
	/// body. Never panics on bad input — every failure path returns an
	/// `{"status":"error", ...}` value.
	pub fn handle_request(&self, raw: RawRequest) -> Value {
		const KNOWN_ACTIONS: &[&str] = &["register", "send", "broadcast", "check", "list", "rename"];
		if !KNOWN_ACTIONS.contains(&raw.action.as_str()) {
			return error_response(DispatchError::UnknownAction(raw.action));
		}

		let now = Utc::now();
		let mut state = self.state.lock().unwrap();

		if raw.action != "register" {
			let Some(token) = raw.session_token.as_deref() else {
				return error_response(DispatchError::InvalidSession);
			};
			let Some(authenticated_id) = session::validate(&state, token) else {
				return error_response(DispatchError::InvalidSession);
			};
			if !rate_limit::check(&mut state, &authenticated_id, now) {
				return error_response(DispatchError::RateLimited);
			}
			if let Some(last_seen) = state.instances.get_mut(&authenticated_id) {
				*last_seen = now;
				if let Err(err) = store::save_instance(&state.db, &authenticated_id, now) {
					tracing::warn!(%err, "failed to persist last_seen");
				}
			}

			let result = match raw.action.as_str() {
				"send" => handle_send(&mut state, &self.config.data_dir, &authenticated_id, raw, now),
				"broadcast" => handle_broadcast(&mut state, &authenticated_id, raw, now),
				"check" => {
					names::clean_expired_forwards(&mut state, now);
					queue::sweep_expired(&mut state, now);
					Ok(json!({"status": "ok", "messages": queue::check(&mut state, &authenticated_id)}))
				}
				"list" => Ok(json!({"status": "ok", "instances": queue::list(&state)})),
				"rename" => handle_rename(&mut state, &authenticated_id, raw, now),
				other => Err(DispatchError::UnknownAction(other.to_string())),
			};
			return result.unwrap_or_else(error_response);
		}

		handle_register(&mut state, &self.config.shared_secret, raw, now).unwrap_or_else(error_response)
	}
}

fn error_response(err: DispatchError) -> Value {
	json!({"status": "error", "message": err.to_string()})
}

fn handle_register(
	state: &mut super::BrokerState,
	shared_secret: &Option<String>,
	raw: RawRequest,
	now: chrono::DateTime<Utc>,
) -> Result<Value, DispatchError> {
	let instance_id = raw.instance_id.ok_or(DispatchError::MissingField("instance_id"))?;

	if !names::validate_identifier(&instance_id) {
		return Err(DispatchError::InvalidInstanceId);
	}
	if !rate_limit::check(state, &format!("register_{instance_id}"), now) {
		return Err(DispatchError::RegistrationRateLimited);
	}
	if let Some(secret) = shared_secret.as_deref().filter(|s| !s.is_empty()) {
		let mut hasher = Sha256::new();
		hasher.update(format!("{instance_id}:{secret}"));
		let expected = format!("{:x}", hasher.finalize());
		if raw.auth_token.as_deref() != Some(expected.as_str()) {
			return Err(DispatchError::InvalidAuthToken);
		}
	}

	let token = session::mint(state, &instance_id);
	state.instances.insert(instance_id.clone(), now);
	if let Err(err) = store::save_instance(&state.db, &instance_id, now) {
		tracing::warn!(%err, "failed to persist instance");
	}

	let queued_count = state.queues.entry(instance_id.clone()).or_default().len();
	let message = if queued_count > 0 {
		format!("Registered {instance_id} with {queued_count} queued messages")
	} else {
		format!("Registered {instance_id}")
	};

	Ok(json!({"status": "ok", "session_token": token, "message": message}))
}

fn handle_send(
	state: &mut super::BrokerState,
	data_dir: &std::path::Path,
	from_id: &str,
	raw: RawRequest,
	now: chrono::DateTime<Utc>,
) -> Result<Value, DispatchError> {
	let to_id = raw.to_id.ok_or(DispatchError::MissingField("to_id"))?;
	let body = raw.message.ok_or(DispatchError::MissingField("message"))?;

	names::clean_expired_forwards(state, now);
	queue::sweep_expired(state, now);

	let outcome = queue::send(state, data_dir, from_id, &to_id, body, now)?;
	Ok(json!({"status": "ok", "message": outcome.wire_message()}))
}

fn handle_broadcast(
	state: &mut super::BrokerState,
	from_id: &str,
	raw: RawRequest,
	now: chrono::DateTime<Utc>,
) -> Result<Value, DispatchError> {
	let body = raw.message.ok_or(DispatchError::MissingField("message"))?;
	let count = queue::broadcast(state, from_id, &body, now);
	Ok(json!({"status": "ok", "message": format!("Broadcast to {count} instances")}))
}

fn handle_rename(
	state: &mut super::BrokerState,
	old_id: &str,
	raw: RawRequest,
	now: chrono::DateTime<Utc>,
) -> Result<Value, DispatchError> {
	let new_id = raw.new_id.ok_or(DispatchError::MissingField("new_id"))?;
	let message = names::rename(state, old_id, &new_id, now)?;
	Ok(json!({"status": "ok", "message": message}))
}
