use super::support::{TestBroker, token_of};

#[test]
fn register_returns_session_token() {
	let broker = TestBroker::new();
	let response = broker.register("fred");
	assert_eq!(response["status"], "ok");
	assert!(!token_of(&response).is_empty());
	assert_eq!(response["message"], "Registered fred");
}

#[test]
fn register_reports_queued_messages() {
	let broker = TestBroker::new();
	let fred = token_of(&broker.register("fred"));
	broker.send(&fred, "fred", "bob", "hi");

	let response = broker.register("bob");
	assert_eq!(response["message"], "Registered bob with 1 queued messages");
}

#[test]
fn rejects_invalid_identifier() {
	let broker = TestBroker::new();
	let response = broker.register("has a space");
	assert_eq!(response["status"], "error");
	assert!(response["message"].as_str().unwrap().starts_with("Invalid instance ID format"));
}

#[test]
fn rejects_reserved_name() {
	let broker = TestBroker::new();
	let response = broker.register("system");
	assert_eq!(response["status"], "error");
}

#[test]
fn enforces_shared_secret_when_configured() {
	let broker = TestBroker::with_secret(Some("topsecret"));

	let bad = broker.core.handle_request(broker_proto::types::RawRequest {
		action: "register".into(),
		instance_id: Some("fred".into()),
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: Some("wrong".into()),
		session_token: None,
		message: None,
	});
	assert_eq!(bad["status"], "error");
	assert_eq!(bad["message"], "Invalid auth token");

	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update("fred:topsecret");
	let expected = format!("{:x}", hasher.finalize());

	let good = broker.core.handle_request(broker_proto::types::RawRequest {
		action: "register".into(),
		instance_id: Some("fred".into()),
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: Some(expected),
		session_token: None,
		message: None,
	});
	assert_eq!(good["status"], "ok");
}

#[test]
fn unknown_action_reports_its_name() {
	let broker = TestBroker::new();
	let response = broker.core.handle_request(broker_proto::types::RawRequest {
		action: "teleport".into(),
		instance_id: None,
		old_id: None,
		new_id: None,
		from_id: None,
		to_id: None,
		auth_token: None,
		session_token: None,
		message: None,
	});
	assert_eq!(response["message"], "Unknown action: teleport");
}
