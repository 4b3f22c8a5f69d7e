//! Name Registry: active-instance table, rename with time-bounded
//! forwarding, and the reserved-name denylist.

use chrono::{DateTime, Utc};

use super::{BrokerState, session, store};
use crate::error::DispatchError;
use broker_proto::constants::{
	IDENTIFIER_MAX_LEN, IDENTIFIER_MIN_LEN, NAME_FORWARD_TTL, RENAME_COOLDOWN, SYSTEM_SENDER,
};

/// `^[A-Za-z0-9_-]{1,32}$`, plus the reserved-name denylist.
pub(crate) fn validate_identifier(id: &str) -> bool {
	let len = id.chars().count();
	if len < IDENTIFIER_MIN_LEN || len > IDENTIFIER_MAX_LEN {
		return false;
	}
	if id == SYSTEM_SENDER {
		return false;
	}
	id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Remove name-forward entries older than [`NAME_FORWARD_TTL`].
pub(crate) fn clean_expired_forwards(state: &mut BrokerState, now: DateTime<Utc>) {
	let ttl = chrono::Duration::from_std(NAME_FORWARD_TTL).unwrap();
	state.name_history.retain(|_, (_, changed_at)| now - *changed_at <= ttl);
}

/// Resolve a recipient through one hop of forwarding history.
pub(crate) fn resolve(state: &BrokerState, name: &str) -> String {
	match state.name_history.get(name) {
		Some((new_name, _)) => new_name.clone(),
		None => name.to_string(),
	}
}

/// Apply a rename: preconditions, queue migration, forward record, rate
/// tracking, session rebinding, and the system broadcast notification.
/// Returns the confirmation message on success.
pub(crate) fn rename(
	state: &mut BrokerState,
	old_id: &str,
	new_id: &str,
	now: DateTime<Utc>,
) -> Result<String, DispatchError> {
	if !validate_identifier(new_id) {
		return Err(DispatchError::InvalidNewInstanceId);
	}
	if !state.instances.contains_key(old_id) {
		return Err(DispatchError::InstanceNotFound(old_id.to_string()));
	}
	if state.instances.contains_key(new_id) {
		return Err(DispatchError::InstanceExists(new_id.to_string()));
	}
	if let Some(last) = state.last_rename.get(old_id) {
		let elapsed = now - *last;
		let cooldown = chrono::Duration::from_std(RENAME_COOLDOWN).unwrap();
		if elapsed < cooldown {
			let minutes_left = (cooldown - elapsed).num_minutes();
			return Err(DispatchError::RenameCooldown(minutes_left));
		}
	}

	let queue = state.queues.remove(old_id).unwrap_or_default();
	state.queues.insert(new_id.to_string(), queue);

	if let Some(last_seen) = state.instances.remove(old_id) {
		state.instances.insert(new_id.to_string(), last_seen);
	}
	if let Err(err) = store::rename_instance(&state.db, old_id, new_id) {
		tracing::warn!(%err, "failed to persist rename");
	}

	state.name_history.insert(old_id.to_string(), (new_id.to_string(), now));
	if let Err(err) = store::save_name_forward(&state.db, old_id, new_id, now) {
		tracing::warn!(%err, "failed to persist name forward");
	}

	state.last_rename.remove(old_id);
	state.last_rename.insert(new_id.to_string(), now);

	session::rebind(state, old_id, new_id);

	let recipients: Vec<String> = state.queues.keys().filter(|id| id.as_str() != new_id).cloned().collect();
	for recipient in recipients {
		let queue = state.queues.entry(recipient.clone()).or_default();
		let notice = super::QueuedMessage {
			db_id: None,
			from: SYSTEM_SENDER.to_string(),
			to: recipient.clone(),
			timestamp: now,
			content: format!("{old_id} renamed to {new_id}"),
			data: None,
			summary: None,
			large_file_path: None,
		};
		if let Ok(id) = store::save_message(&state.db, &notice) {
			let mut notice = notice;
			notice.db_id = Some(id);
			queue.push_back(notice);
		} else {
			queue.push_back(notice);
		}
	}

	Ok(format!("Renamed {old_id} to {new_id}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_boundary_lengths() {
		assert!(validate_identifier("a"));
		assert!(validate_identifier(&"a".repeat(32)));
		assert!(!validate_identifier(""));
		assert!(!validate_identifier(&"a".repeat(33)));
	}

	#[test]
	fn rejects_reserved_name() {
		assert!(!validate_identifier("system"));
	}

	#[test]
	fn rejects_non_alphanumeric() {
		assert!(!validate_identifier("bad name"));
		assert!(!validate_identifier("bad/name"));
	}
}
