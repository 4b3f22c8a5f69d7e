//! Persistence Store: a SQLite database holding messages, instances,
//! sessions, and name-history, so an unread message or an active session
//! survives a broker restart.
//!
//! Every write here is best-effort: a failure is logged by the caller and
//! the in-memory state remains authoritative for live delivery, per
//! `spec.md` §7's Infrastructure row. This module never returns an error
//! to a wire handler directly — callers decide whether a [`StoreError`]
//! is worth surfacing (it never is, for writes) or fatal (it is, at
//! startup, for opening the database).

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::{QueuedMessage, SessionRecord};
use crate::error::{BrokerError, StoreError};

pub(crate) fn open(db_path: &Path) -> Result<Connection, BrokerError> {
	let conn = Connection::open(db_path).map_err(StoreError::from)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		if db_path.exists() {
			let perms = std::fs::Permissions::from_mode(0o600);
			let _ = std::fs::set_permissions(db_path, perms);
		}
	}
	Ok(conn)
}

pub(crate) fn init_schema(conn: &Connection) -> Result<(), BrokerError> {
	conn.execute_batch(
		r#"
		CREATE TABLE IF NOT EXISTS messages (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			from_id TEXT NOT NULL,
			to_id TEXT NOT NULL,
			content TEXT NOT NULL,
			timestamp TEXT NOT NULL,
			data TEXT,
			summary TEXT,
			large_file_path TEXT,
			read_flag INTEGER NOT NULL DEFAULT 0
		);
		CREATE TABLE IF NOT EXISTS instances (
			instance_id TEXT PRIMARY KEY,
			last_seen TEXT NOT NULL
		);
		CREATE TABLE IF NOT EXISTS sessions (
			session_token_hash TEXT PRIMARY KEY,
			instance_id TEXT NOT NULL,
			created_at TEXT NOT NULL,
			expires_at TEXT NOT NULL
		);
		CREATE TABLE IF NOT EXISTS name_history (
			old_name TEXT PRIMARY KEY,
			new_name TEXT NOT NULL,
			changed_at TEXT NOT NULL
		);
		"#,
	)
	.map_err(StoreError::from)?;
	Ok(())
}

pub(crate) struct Recovered {
	pub(crate) queues: HashMap<String, VecDeque<QueuedMessage>>,
	pub(crate) instances: HashMap<String, DateTime<Utc>>,
	pub(crate) name_history: HashMap<String, (String, DateTime<Utc>)>,
	pub(crate) sessions: HashMap<String, SessionRecord>,
	pub(crate) instance_sessions: HashMap<String, String>,
}

/// Purge expired sessions, then load unread messages, active instances,
/// live sessions, and name-history into memory.
pub(crate) fn recover(conn: &mut Connection, now: DateTime<Utc>) -> Result<Recovered, BrokerError> {
	conn.execute(
		"DELETE FROM sessions WHERE expires_at <= ?1",
		params![now.to_rfc3339()],
	)
	.map_err(StoreError::from)?;

	let mut queues: HashMap<String, VecDeque<QueuedMessage>> = HashMap::new();
	{
		let mut stmt = conn
			.prepare(
				"SELECT id, from_id, to_id, content, timestamp, data, summary, large_file_path FROM messages \
				 WHERE read_flag = 0 ORDER BY timestamp",
			)
			.map_err(StoreError::from)?;
		let rows = stmt
			.query_map([], |row| {
				let data_raw: Option<String> = row.get(5)?;
				Ok((
					row.get::<_, i64>(0)?,
					row.get::<_, String>(1)?,
					row.get::<_, String>(2)?,
					row.get::<_, String>(3)?,
					row.get::<_, String>(4)?,
					data_raw,
					row.get::<_, Option<String>>(6)?,
					row.get::<_, Option<String>>(7)?,
				))
			})
			.map_err(StoreError::from)?;
		for row in rows {
			let (id, from_id, to_id, content, timestamp, data_raw, summary, large_file_path) = row.map_err(StoreError::from)?;
			let timestamp = DateTime::parse_from_rfc3339(&timestamp)
				.map(|dt| dt.with_timezone(&Utc))
				.unwrap_or(now);
			let data = data_raw.and_then(|s| serde_json::from_str(&s).ok());
			queues.entry(to_id.clone()).or_default().push_back(QueuedMessage {
				db_id: Some(id),
				from: from_id,
				to: to_id,
				timestamp,
				content,
				data,
				summary,
				large_file_path,
			});
		}
	}

	let mut instances = HashMap::new();
	{
		let mut stmt = conn
			.prepare("SELECT instance_id, last_seen FROM instances")
			.map_err(StoreError::from)?;
		let rows = stmt
			.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
			.map_err(StoreError::from)?;
		for row in rows {
			let (id, last_seen) = row.map_err(StoreError::from)?;
			let last_seen = DateTime::parse_from_rfc3339(&last_seen)
				.map(|dt| dt.with_timezone(&Utc))
				.unwrap_or(now);
			instances.insert(id, last_seen);
		}
	}

	let mut sessions = HashMap::new();
	let mut instance_sessions = HashMap::new();
	{
		let mut stmt = conn
			.prepare("SELECT session_token_hash, instance_id, created_at, expires_at FROM sessions")
			.map_err(StoreError::from)?;
		let rows = stmt
			.query_map([], |row| {
				Ok((
					row.get::<_, String>(0)?,
					row.get::<_, String>(1)?,
					row.get::<_, String>(2)?,
					row.get::<_, String>(3)?,
				))
			})
			.map_err(StoreError::from)?;
		for row in rows {
			let (hash, instance_id, created_at, expires_at) = row.map_err(StoreError::from)?;
			let created_at = DateTime::parse_from_rfc3339(&created_at)
				.map(|dt| dt.with_timezone(&Utc))
				.unwrap_or(now);
			let expires_at = DateTime::parse_from_rfc3339(&expires_at)
				.map(|dt| dt.with_timezone(&Utc))
				.unwrap_or(now);
			instance_sessions.insert(instance_id.clone(), hash.clone());
			sessions.insert(
				hash,
				SessionRecord {
					instance_id,
					created_at,
					expires_at,
				},
			);
		}
	}

	let mut name_history = HashMap::new();
	{
		let mut stmt = conn
			.prepare("SELECT old_name, new_name, changed_at FROM name_history")
			.map_err(StoreError::from)?;
		let rows = stmt
			.query_map([], |row| {
				Ok((
					row.get::<_, String>(0)?,
					row.get::<_, String>(1)?,
					row.get::<_, String>(2)?,
				))
			})
			.map_err(StoreError::from)?;
		for row in rows {
			let (old_name, new_name, changed_at) = row.map_err(StoreError::from)?;
			let changed_at = DateTime::parse_from_rfc3339(&changed_at)
				.map(|dt| dt.with_timezone(&Utc))
				.unwrap_or(now);
			name_history.insert(old_name, (new_name, changed_at));
		}
	}

	Ok(Recovered {
		queues,
		instances,
		name_history,
		sessions,
		instance_sessions,
	})
}

/// Insert a message row, returning its autoincremented id on success.
pub(crate) fn save_message(conn: &Connection, msg: &QueuedMessage) -> Result<i64, StoreError> {
	let data = msg.data.as_ref().map(serde_json::to_string).transpose()?;
	conn.execute(
		"INSERT INTO messages (from_id, to_id, content, timestamp, data, summary, large_file_path) \
		 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
		params![
			msg.from,
			msg.to,
			msg.content,
			msg.timestamp.to_rfc3339(),
			data,
			msg.summary,
			msg.large_file_path,
		],
	)?;
	Ok(conn.last_insert_rowid())
}

pub(crate) fn mark_read(conn: &Connection, ids: &[i64]) -> Result<(), StoreError> {
	for id in ids {
		conn.execute("UPDATE messages SET read_flag = 1 WHERE id = ?1", params![id])?;
	}
	Ok(())
}

pub(crate) fn save_instance(conn: &Connection, instance_id: &str, last_seen: DateTime<Utc>) -> Result<(), StoreError> {
	conn.execute(
		"INSERT INTO instances (instance_id, last_seen) VALUES (?1, ?2) \
		 ON CONFLICT(instance_id) DO UPDATE SET last_seen = excluded.last_seen",
		params![instance_id, last_seen.to_rfc3339()],
	)?;
	Ok(())
}

pub(crate) fn rename_instance(conn: &Connection, old_id: &str, new_id: &str) -> Result<(), StoreError> {
	conn.execute("DELETE FROM instances WHERE instance_id = ?1", params![old_id])?;
	conn.execute(
		"INSERT INTO instances (instance_id, last_seen) VALUES (?1, ?2) \
		 ON CONFLICT(instance_id) DO UPDATE SET last_seen = excluded.last_seen",
		params![new_id, Utc::now().to_rfc3339()],
	)?;
	Ok(())
}

pub(crate) fn save_session(
	conn: &Connection,
	token_hash: &str,
	instance_id: &str,
	created_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
) -> Result<(), StoreError> {
	conn.execute(
		"INSERT INTO sessions (session_token_hash, instance_id, created_at, expires_at) \
		 VALUES (?1, ?2, ?3, ?4) \
		 ON CONFLICT(session_token_hash) DO UPDATE SET instance_id = excluded.instance_id, \
		 created_at = excluded.created_at, expires_at = excluded.expires_at",
		params![token_hash, instance_id, created_at.to_rfc3339(), expires_at.to_rfc3339()],
	)?;
	Ok(())
}

pub(crate) fn rebind_session(conn: &Connection, token_hash: &str, new_instance_id: &str) -> Result<(), StoreError> {
	conn.execute(
		"UPDATE sessions SET instance_id = ?1 WHERE session_token_hash = ?2",
		params![new_instance_id, token_hash],
	)?;
	Ok(())
}

pub(crate) fn save_name_forward(
	conn: &Connection,
	old_name: &str,
	new_name: &str,
	changed_at: DateTime<Utc>,
) -> Result<(), StoreError> {
	conn.execute(
		"INSERT INTO name_history (old_name, new_name, changed_at) VALUES (?1, ?2, ?3) \
		 ON CONFLICT(old_name) DO UPDATE SET new_name = excluded.new_name, changed_at = excluded.changed_at",
		params![old_name, new_name, changed_at.to_rfc3339()],
	)?;
	Ok(())
}

/// Delete messages older than the TTL that are addressed to an identity
/// with no active registration.
pub(crate) fn sweep_expired_messages(conn: &Connection, cutoff: DateTime<Utc>) -> Result<(), StoreError> {
	conn.execute(
		"DELETE FROM messages WHERE timestamp < ?1 \
		 AND to_id NOT IN (SELECT instance_id FROM instances)",
		params![cutoff.to_rfc3339()],
	)?;
	Ok(())
}
