use broker_proto::types::{MessageBody, RawRequest};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::{BrokerConfig, BrokerCore};

/// A [`BrokerCore`] backed by a throwaway temp directory, plus the
/// directory itself so it isn't dropped (and deleted) while in use.
pub(super) struct TestBroker {
	pub(super) core: BrokerCore,
	_dir: TempDir,
}

impl TestBroker {
	pub(super) fn new() -> Self {
		Self::with_secret(None)
	}

	pub(super) fn with_secret(shared_secret: Option<&str>) -> Self {
		let dir = TempDir::new().unwrap();
		let core = BrokerCore::new(BrokerConfig {
			data_dir: dir.path().to_path_buf(),
			shared_secret: shared_secret.map(str::to_string),
		})
		.unwrap();
		Self { core, _dir: dir }
	}

	pub(super) fn register(&self, instance_id: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "register".into(),
			instance_id: Some(instance_id.into()),
			old_id: None,
			new_id: None,
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: None,
			message: None,
		})
	}

	pub(super) fn send(&self, token: &str, from_id: &str, to_id: &str, content: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "send".into(),
			instance_id: None,
			old_id: None,
			new_id: None,
			from_id: Some(from_id.into()),
			to_id: Some(to_id.into()),
			auth_token: None,
			session_token: Some(token.into()),
			message: Some(MessageBody {
				content: content.into(),
				data: None,
			}),
		})
	}

	pub(super) fn broadcast(&self, token: &str, from_id: &str, content: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "broadcast".into(),
			instance_id: None,
			old_id: None,
			new_id: None,
			from_id: Some(from_id.into()),
			to_id: None,
			auth_token: None,
			session_token: Some(token.into()),
			message: Some(MessageBody {
				content: content.into(),
				data: None,
			}),
		})
	}

	pub(super) fn check(&self, token: &str, instance_id: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "check".into(),
			instance_id: Some(instance_id.into()),
			old_id: None,
			new_id: None,
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: Some(token.into()),
			message: None,
		})
	}

	pub(super) fn list(&self, token: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "list".into(),
			instance_id: None,
			old_id: None,
			new_id: None,
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: Some(token.into()),
			message: None,
		})
	}

	pub(super) fn rename(&self, token: &str, old_id: &str, new_id: &str) -> Value {
		self.core.handle_request(RawRequest {
			action: "rename".into(),
			instance_id: None,
			old_id: Some(old_id.into()),
			new_id: Some(new_id.into()),
			from_id: None,
			to_id: None,
			auth_token: None,
			session_token: Some(token.into()),
			message: None,
		})
	}
}

pub(super) fn token_of(response: &Value) -> String {
	response["session_token"].as_str().unwrap().to_string()
}
