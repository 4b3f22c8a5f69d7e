use super::support::{TestBroker, token_of};

#[test]
fn content_at_10240_bytes_stays_inline() {
	let broker = TestBroker::new();
	let sender = token_of(&broker.register("sender"));
	let receiver = token_of(&broker.register("receiver"));

	let content = "x".repeat(10_240);
	broker.send(&sender, "sender", "receiver", &content);

	let checked = broker.check(&receiver, "receiver");
	let messages = checked["messages"].as_array().unwrap();
	assert_eq!(messages[0]["message"]["content"], content);
	assert!(messages[0]["message"]["data"].is_null());
}

#[test]
fn content_at_10241_bytes_spills() {
	let broker = TestBroker::new();
	let sender = token_of(&broker.register("sender"));
	let receiver = token_of(&broker.register("receiver"));

	let content = "x".repeat(10_241);
	broker.send(&sender, "sender", "receiver", &content);

	let checked = broker.check(&receiver, "receiver");
	let messages = checked["messages"].as_array().unwrap();
	assert!(!messages[0]["message"]["data"]["large_message_file"].is_null());
}

#[test]
fn identifier_length_one_and_thirty_two_accepted() {
	let broker = TestBroker::new();
	assert_eq!(broker.register("a")["status"], "ok");
	assert_eq!(broker.register(&"b".repeat(32))["status"], "ok");
}

#[test]
fn identifier_length_zero_and_thirty_three_rejected() {
	let broker = TestBroker::new();
	assert_eq!(broker.register("")["status"], "error");
	assert_eq!(broker.register(&"c".repeat(33))["status"], "error");
}

#[test]
fn queue_cap_boundary_at_exactly_100() {
	let broker = TestBroker::new();
	let sender = token_of(&broker.register("sender"));
	broker.register("receiver");

	for _ in 0..99 {
		assert_eq!(broker.send(&sender, "sender", "receiver", "msg")["status"], "ok");
	}
	assert_eq!(broker.send(&sender, "sender", "receiver", "msg")["status"], "ok");
	assert_eq!(broker.send(&sender, "sender", "receiver", "msg")["status"], "error");
}
