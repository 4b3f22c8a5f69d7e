use tempfile::TempDir;

use crate::core::{BrokerConfig, BrokerCore};

use super::support::token_of;

#[test]
fn unread_messages_survive_a_restart() {
	let dir = TempDir::new().unwrap();
	let config = |shared_secret: Option<&str>| BrokerConfig {
		data_dir: dir.path().to_path_buf(),
		shared_secret: shared_secret.map(str::to_string),
	};

	{
		let core = BrokerCore::new(config(None)).unwrap();
		let fred = token_of(&core.handle_request(broker_proto::types::RawRequest {
			action: "register".into(),
			instance_id: Some("fred".into()),
			old_id: None,
			new_id: None,
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: None,
			message: None,
		}));
		core.handle_request(broker_proto::types::RawRequest {
			action: "send".into(),
			instance_id: None,
			old_id: None,
			new_id: None,
			from_id: Some("fred".into()),
			to_id: Some("barney".into()),
			auth_token: None,
			session_token: Some(fred),
			message: Some(broker_proto::types::MessageBody {
				content: "surviving message".into(),
				data: None,
			}),
		});
	}

	// A brand new BrokerCore over the same data directory recovers the
	// unread message for "barney" even though no session is recoverable.
	let core = BrokerCore::new(config(None)).unwrap();
	let barney = token_of(&core.handle_request(broker_proto::types::RawRequest {
		action: "register".into(),
		instance_id: Some("barney".into()),
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: None,
		session_token: None,
		message: None,
	}));
	let checked = core.handle_request(broker_proto::types::RawRequest {
		action: "check".into(),
		instance_id: Some("barney".into()),
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: None,
		session_token: Some(barney),
		message: None,
	});
	let messages = checked["messages"].as_array().unwrap();
	assert_eq!(messages.len(), 1);
	assert_eq!(messages[0]["message"]["content"], "surviving message");
}

#[test]
fn sessions_survive_a_restart() {
	let dir = TempDir::new().unwrap();
	let config = || BrokerConfig {
		data_dir: dir.path().to_path_buf(),
		shared_secret: None,
	};

	let token = {
		let core = BrokerCore::new(config()).unwrap();
		token_of(&core.handle_request(broker_proto::types::RawRequest {
			action: "register".into(),
			instance_id: Some("fred".into()),
			old_id: None,
			new_id: None,
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: None,
			message: None,
		}))
	};

	// Only the hash is persisted, but the raw token still hashes to the
	// recovered row, so a session minted before a restart keeps working.
	let core = BrokerCore::new(config()).unwrap();
	let response = core.handle_request(broker_proto::types::RawRequest {
		action: "list".into(),
		instance_id: None,
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: None,
		session_token: Some(token),
		message: None,
	});
	assert_eq!(response["status"], "ok");
}

#[cfg(unix)]
#[test]
fn database_file_has_restricted_permissions() {
	use std::os::unix::fs::PermissionsExt;

	let dir = TempDir::new().unwrap();
	let _core = BrokerCore::new(BrokerConfig {
		data_dir: dir.path().to_path_buf(),
		shared_secret: None,
	})
	.unwrap();

	let db_path = broker_proto::paths::db_path(dir.path());
	let metadata = std::fs::metadata(db_path).unwrap();
	assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
}
