//! Rate Limiter: a sliding 60-second window of request timestamps per key.
//!
//! Keys are either an authenticated identity or the special
//! `register_<id>` key used to slow registration attempts. Windows live
//! only in memory, as `spec.md` §4.10 specifies, and are pruned lazily on
//! each check rather than by a background sweep.

use chrono::{DateTime, Utc};

use super::BrokerState;
use broker_proto::constants::{RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW};

/// Prune the key's window to the last [`RATE_LIMIT_WINDOW`] and record
/// `now` if the request is allowed. Returns whether it was allowed.
pub(crate) fn check(state: &mut BrokerState, key: &str, now: DateTime<Utc>) -> bool {
	let window = chrono::Duration::from_std(RATE_LIMIT_WINDOW).unwrap();
	let entry = state.rate_windows.entry(key.to_string()).or_default();
	entry.retain(|ts| now - *ts < window);

	if entry.len() >= RATE_LIMIT_MAX_REQUESTS {
		return false;
	}
	entry.push_back(now);
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::VecDeque;

	fn fresh_state() -> BrokerState {
		let conn = rusqlite::Connection::open_in_memory().unwrap();
		super::super::store::init_schema(&conn).unwrap();
		BrokerState {
			queues: Default::default(),
			instances: Default::default(),
			name_history: Default::default(),
			last_rename: Default::default(),
			sessions: Default::default(),
			instance_sessions: Default::default(),
			rate_windows: Default::default(),
			db: conn,
		}
	}

	#[test]
	fn allows_up_to_the_cap() {
		let mut state = fresh_state();
		let now = Utc::now();
		for _ in 0..100 {
			assert!(check(&mut state, "alice", now));
		}
		assert!(!check(&mut state, "alice", now));
	}

	#[test]
	fn prunes_entries_outside_window() {
		let mut state = fresh_state();
		let old = Utc::now() - chrono::Duration::seconds(120);
		state.rate_windows.insert("alice".into(), VecDeque::from([old]));
		assert!(check(&mut state, "alice", Utc::now()));
		assert_eq!(state.rate_windows.get("alice").unwrap().len(), 1);
	}
}
