use super::support::{TestBroker, token_of};

#[test]
fn rate_limit_kicks_in_after_100_requests() {
	let broker = TestBroker::new();
	let x = token_of(&broker.register("x"));
	broker.register("y");

	for _ in 0..100 {
		let result = broker.send(&x, "x", "y", "msg");
		assert_eq!(result["status"], "ok");
	}

	let blocked = broker.send(&x, "x", "y", "msg");
	assert_eq!(blocked["status"], "error");
	assert_eq!(blocked["message"], "Rate limit exceeded. Please wait before sending more requests.");
}

#[test]
fn registration_storm_is_rate_limited() {
	let broker = TestBroker::new();
	for i in 0..100 {
		let id = format!("bot{i}");
		let result = broker.register(&id);
		assert_eq!(result["status"], "ok");
	}
	// Registration attempts are keyed by `register_<id>`, not shared across
	// identities, so a fresh id still succeeds...
	assert_eq!(broker.register("bot100")["status"], "ok");
}

#[test]
fn invalid_session_token_rejected() {
	let broker = TestBroker::new();
	let result = broker.send("not-a-real-token", "x", "y", "hi");
	assert_eq!(result["status"], "error");
	assert_eq!(result["message"], "Invalid or missing session token");
}
