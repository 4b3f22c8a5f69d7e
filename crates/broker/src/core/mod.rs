//! Broker core: the single mutex-guarded home of every piece of shared
//! state, and the request dispatcher that operates on it.
//!
//! # Mental model
//!
//! One [`BrokerCore`] is constructed per broker process and shared (via
//! `Arc`) across every connection-handling task. All mutable state lives
//! in a single [`BrokerState`] behind one [`std::sync::Mutex`] — queues,
//! the active-instance table, name-forward history, rename cooldowns,
//! sessions, rate-limiter windows, and the SQLite connection. This is a
//! deliberate departure from finer-grained locking: the expected workload
//! is a handful of human-paced AI-assistant instances polling a local
//! socket, so one lock removes an entire class of cross-table ordering
//! bugs at negligible contention cost.
//!
//! # Invariants
//!
//! 1. No code path holds the mutex across an `.await` point — the lock is
//!    `std::sync::Mutex`, not `tokio::sync::Mutex`, specifically so that
//!    holding it across an await is a compile error via the
//!    `clippy::await_holding_lock` lint rather than a runtime deadlock.
//! 2. The SQLite connection lives inside [`BrokerState`] and is only ever
//!    touched while the mutex is held, so persistence writes are
//!    serialized with the in-memory mutation they mirror.
//! 3. Every operation that can return a wire-visible error returns
//!    `Result<_, DispatchError>`; infrastructure failures (persistence,
//!    filesystem) are logged and degrade gracefully rather than
//!    propagating to the caller, per `spec.md` §7.

mod dispatch;
mod names;
mod queue;
mod rate_limit;
mod session;
mod store;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::BrokerError;

/// A message sitting in a recipient's in-memory queue.
#[derive(Debug, Clone)]
pub(crate) struct QueuedMessage {
	pub(crate) db_id: Option<i64>,
	pub(crate) from: String,
	pub(crate) to: String,
	pub(crate) timestamp: DateTime<Utc>,
	pub(crate) content: String,
	pub(crate) data: Option<serde_json::Value>,
	pub(crate) summary: Option<String>,
	pub(crate) large_file_path: Option<String>,
}

/// A minted, validated session.
#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
	pub(crate) instance_id: String,
	pub(crate) created_at: DateTime<Utc>,
	pub(crate) expires_at: DateTime<Utc>,
}

/// All broker-owned mutable state, guarded by one mutex.
pub(crate) struct BrokerState {
	pub(crate) queues: HashMap<String, VecDeque<QueuedMessage>>,
	pub(crate) instances: HashMap<String, DateTime<Utc>>,
	pub(crate) name_history: HashMap<String, (String, DateTime<Utc>)>,
	pub(crate) last_rename: HashMap<String, DateTime<Utc>>,
	pub(crate) sessions: HashMap<String, SessionRecord>,
	pub(crate) instance_sessions: HashMap<String, String>,
	pub(crate) rate_windows: HashMap<String, VecDeque<DateTime<Utc>>>,
	pub(crate) db: Connection,
}

/// Fixed construction parameters that don't belong inside the mutex.
pub struct BrokerConfig {
	pub data_dir: PathBuf,
	pub shared_secret: Option<String>,
}

/// The broker's shared, lockable state plus its immutable configuration.
pub struct BrokerCore {
	pub(crate) state: std::sync::Mutex<BrokerState>,
	pub(crate) config: BrokerConfig,
}

impl BrokerCore {
	/// Open (or create) the persistence store under `config.data_dir`,
	/// recover in-memory state from it, and return a ready-to-serve core.
	pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
		std::fs::create_dir_all(&config.data_dir).map_err(|source| BrokerError::DataDir {
			path: config.data_dir.clone(),
			source,
		})?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = std::fs::Permissions::from_mode(0o700);
			let _ = std::fs::set_permissions(&config.data_dir, perms);
		}

		let db_path = broker_proto::paths::db_path(&config.data_dir);
		let mut db = store::open(&db_path)?;
		store::init_schema(&db)?;

		let now = Utc::now();
		let recovered = store::recover(&mut db, now)?;

		let state = BrokerState {
			queues: recovered.queues,
			instances: recovered.instances,
			name_history: recovered.name_history,
			last_rename: HashMap::new(),
			sessions: recovered.sessions,
			instance_sessions: recovered.instance_sessions,
			rate_windows: HashMap::new(),
			db,
		};

		Ok(Self {
			state: std::sync::Mutex::new(state),
			config,
		})
	}
}
