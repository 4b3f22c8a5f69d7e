//! Session Manager: mints opaque tokens, validates them against the
//! in-memory map (itself recovered from persistence at startup), and
//! handles rebinding a session to a new identity after a rename.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{BrokerState, SessionRecord, store};
use broker_proto::constants::{SESSION_TOKEN_SALT, SESSION_TTL};

/// A cryptographically random, URL-safe token with 256 bits of entropy.
fn generate_token() -> String {
	let mut bytes = [0u8; 32];
	rand::rng().fill_bytes(&mut bytes);
	URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(format!("{SESSION_TOKEN_SALT}:{token}"));
	format!("{:x}", hasher.finalize())
}

/// Mint a fresh session for `instance_id`, persist it, and return the raw
/// token. The raw value is never stored — only its hash.
pub(crate) fn mint(state: &mut BrokerState, instance_id: &str) -> String {
	let token = generate_token();
	let hash = hash_token(&token);
	let now = Utc::now();
	let expires_at = now + chrono::Duration::from_std(SESSION_TTL).unwrap();

	state.instance_sessions.insert(instance_id.to_string(), hash.clone());
	state.sessions.insert(
		hash.clone(),
		SessionRecord {
			instance_id: instance_id.to_string(),
			created_at: now,
			expires_at,
		},
	);

	if let Err(err) = store::save_session(&state.db, &hash, instance_id, now, expires_at) {
		tracing::warn!(%err, "failed to persist session");
	}

	token
}

/// Validate a presented raw token, returning the bound instance id.
pub(crate) fn validate(state: &BrokerState, token: &str) -> Option<String> {
	let hash = hash_token(token);
	let record = state.sessions.get(&hash)?;
	if record.expires_at <= Utc::now() {
		return None;
	}
	Some(record.instance_id.clone())
}

/// Rebind the session that authorized a rename to the new identity.
pub(crate) fn rebind(state: &mut BrokerState, old_id: &str, new_id: &str) {
	if let Some(hash) = state.instance_sessions.remove(old_id) {
		if let Some(record) = state.sessions.get_mut(&hash) {
			record.instance_id = new_id.to_string();
		}
		state.instance_sessions.insert(new_id.to_string(), hash.clone());
		if let Err(err) = store::rebind_session(&state.db, &hash, new_id) {
			tracing::warn!(%err, "failed to persist session rebind");
		}
	}
}
