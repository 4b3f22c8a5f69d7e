//! Queue Engine: per-recipient FIFO queues, the oversized-payload spill
//! path, broadcast fan-out, and TTL cleanup for unregistered recipients.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{BrokerState, QueuedMessage, names, store};
use broker_proto::constants::{MESSAGE_TTL, QUEUE_CAP, SPILL_THRESHOLD_BYTES};
use broker_proto::types::{Instance, Message, MessageBody};
use crate::error::DispatchError;

/// Result of a successful `send`, distinguishing the three possible wire
/// messages without forcing the caller to re-derive them.
pub(crate) enum SendOutcome {
	Forwarded { from: String, to: String },
	FutureDelivery { to: String },
	Delivered,
}

impl SendOutcome {
	pub(crate) fn wire_message(&self) -> String {
		match self {
			SendOutcome::Forwarded { from, to } => format!("Message forwarded from {from} to {to}"),
			SendOutcome::FutureDelivery { to } => format!("Message queued for {to} (not yet registered)"),
			SendOutcome::Delivered => "Message sent".to_string(),
		}
	}
}

/// Enqueue one message from `from` to `to`, applying the spill path if the
/// content exceeds [`SPILL_THRESHOLD_BYTES`].
pub(crate) fn send(
	state: &mut BrokerState,
	data_dir: &Path,
	from: &str,
	to: &str,
	mut body: MessageBody,
	now: DateTime<Utc>,
) -> Result<SendOutcome, DispatchError> {
	if !names::validate_identifier(to) {
		return Err(DispatchError::InvalidRecipientId);
	}

	let size = body.content.as_bytes().len();
	let mut spill_summary = None;
	let mut spill_path = None;
	if size > SPILL_THRESHOLD_BYTES {
		let path = save_large_message(data_dir, from, to, &body.content, now).map_err(|err| {
			tracing::error!(%err, "failed to save large message");
			DispatchError::SpillFailed
		})?;
		let summary = create_summary(&body.content);
		let mut data = body.data.unwrap_or_else(|| json!({}));
		let size_kb = (size as f64 / 1024.0 * 10.0).round() / 10.0;
		if let Value::Object(map) = &mut data {
			map.insert("large_message_file".into(), json!(path.display().to_string()));
			map.insert("original_size_kb".into(), json!(size_kb));
		}
		body = MessageBody {
			content: format!("{summary} Full content saved to: {}", path.display()),
			data: Some(data),
		};
		spill_path = Some(path.display().to_string());
		spill_summary = Some(summary);
	}

	let resolved_to = names::resolve(state, to);
	let forwarded = resolved_to != to;

	let future_delivery = if !state.queues.contains_key(&resolved_to) {
		state.queues.insert(resolved_to.clone(), Default::default());
		true
	} else {
		!state.instances.contains_key(&resolved_to)
	};

	if state.queues.get(&resolved_to).map(|q| q.len()).unwrap_or(0) >= QUEUE_CAP {
		return Err(DispatchError::QueueFull(resolved_to));
	}

	let mut msg = QueuedMessage {
		db_id: None,
		from: from.to_string(),
		to: resolved_to.clone(),
		timestamp: now,
		content: body.content,
		data: body.data,
		summary: spill_summary,
		large_file_path: spill_path,
	};
	match store::save_message(&state.db, &msg) {
		Ok(id) => msg.db_id = Some(id),
		Err(err) => tracing::warn!(%err, "failed to persist message"),
	}
	state.queues.entry(resolved_to.clone()).or_default().push_back(msg);

	Ok(if forwarded {
		SendOutcome::Forwarded {
			from: to.to_string(),
			to: resolved_to,
		}
	} else if future_delivery {
		SendOutcome::FutureDelivery { to: resolved_to }
	} else {
		SendOutcome::Delivered
	})
}

/// Enqueue `body` to every identity with a queue (registered or not),
/// skipping the sender. Returns the number of recipients reached.
pub(crate) fn broadcast(state: &mut BrokerState, from: &str, body: &MessageBody, now: DateTime<Utc>) -> usize {
	let recipients: Vec<String> = state.queues.keys().filter(|id| id.as_str() != from).cloned().collect();
	let mut count = 0;
	for to in recipients {
		let mut msg = QueuedMessage {
			db_id: None,
			from: from.to_string(),
			to: to.clone(),
			timestamp: now,
			content: body.content.clone(),
			data: body.data.clone(),
			summary: None,
			large_file_path: None,
		};
		match store::save_message(&state.db, &msg) {
			Ok(id) => msg.db_id = Some(id),
			Err(err) => tracing::warn!(%err, "failed to persist broadcast message"),
		}
		state.queues.entry(to).or_default().push_back(msg);
		count += 1;
	}
	count
}

/// Atomically drain the resolved recipient's queue and mark the drained
/// messages read in persistence.
pub(crate) fn check(state: &mut BrokerState, instance_id: &str) -> Vec<Message> {
	let resolved = names::resolve(state, instance_id);
	let Some(drained) = state.queues.insert(resolved, Default::default()) else {
		return Vec::new();
	};

	let ids: Vec<i64> = drained.iter().filter_map(|m| m.db_id).collect();
	if !ids.is_empty() {
		if let Err(err) = store::mark_read(&state.db, &ids) {
			tracing::warn!(%err, "failed to mark messages read");
		}
	}

	drained
		.into_iter()
		.map(|m| Message {
			from: m.from,
			to: m.to,
			timestamp: m.timestamp.to_rfc3339(),
			message: MessageBody {
				content: m.content,
				data: m.data,
			},
		})
		.collect()
}

pub(crate) fn list(state: &BrokerState) -> Vec<Instance> {
	state
		.instances
		.iter()
		.map(|(id, last_seen)| Instance {
			id: id.clone(),
			last_seen: last_seen.to_rfc3339(),
		})
		.collect()
}

/// Drop queue entries older than [`MESSAGE_TTL`] for identities with no
/// active registration, in memory and in persistence.
pub(crate) fn sweep_expired(state: &mut BrokerState, now: DateTime<Utc>) {
	let ttl = chrono::Duration::from_std(MESSAGE_TTL).unwrap();
	let registered = state.instances.clone();
	for (id, queue) in state.queues.iter_mut() {
		if registered.contains_key(id) {
			continue;
		}
		queue.retain(|msg| now - msg.timestamp < ttl);
	}
	state.queues.retain(|id, queue| registered.contains_key(id) || !queue.is_empty());

	let cutoff = now - ttl;
	if let Err(err) = store::sweep_expired_messages(&state.db, cutoff) {
		tracing::warn!(%err, "failed to sweep expired messages from database");
	}
}

/// First two sentences (terminated by `.`, `!`, or `?`, each at least 10
/// non-whitespace characters) or, failing that, a 150-character prefix.
pub(crate) fn create_summary(content: &str) -> String {
	const MAX_LEN: usize = 150;
	let content = content.trim();

	let mut sentences = Vec::new();
	let mut current = String::new();
	for ch in content.chars() {
		current.push(ch);
		if matches!(ch, '.' | '!' | '?') && current.trim().chars().count() > 10 {
			sentences.push(current.trim().to_string());
			current.clear();
			if sentences.len() >= 2 {
				break;
			}
		}
	}

	if !sentences.is_empty() {
		return sentences.join(" ");
	}

	let truncated: String = content.chars().take(MAX_LEN).collect();
	if content.chars().count() > MAX_LEN {
		format!("{}...", truncated.trim())
	} else {
		truncated
	}
}

/// Write the full content of a spilled message to a private file and
/// return its path. Caller is responsible for surfacing failures.
fn save_large_message(data_dir: &Path, from: &str, to: &str, content: &str, now: DateTime<Utc>) -> std::io::Result<PathBuf> {
	let dir = broker_proto::paths::large_message_dir(data_dir);
	std::fs::create_dir_all(&dir)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
	}

	let safe_from = from.replace(['/', '\\'], "_");
	let safe_to = to.replace(['/', '\\'], "_");
	let filename = format!("{}_{safe_from}_{safe_to}_message.md", now.format("%Y%m%d-%H%M%S"));
	let path = dir.join(filename);

	let size_kb = content.as_bytes().len() as f64 / 1024.0;
	let file_content = format!(
		"# IPC Message\nFrom: {from}\nTo: {to}\nTime: {}\nSize: {size_kb:.1}KB\n\n## Content\n{content}\n",
		now.to_rfc3339(),
	);

	let mut file = std::fs::File::create(&path)?;
	file.write_all(file_content.as_bytes())?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
	}

	Ok(path)
}
