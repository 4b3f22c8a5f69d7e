//! Protocol-level constants shared by the broker and (eventually) clients.

use std::time::Duration;

/// Default bind address for the broker's TCP listener.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9876";

/// Hard cap on the first read of an inbound connection.
pub const REQUEST_READ_CAP: usize = 4096;

/// Hard cap on a client's read of the response.
pub const RESPONSE_READ_CAP: usize = 65536;

/// Accept-loop poll timeout; shutdown is observed within one of these.
pub const ACCEPT_POLL: Duration = Duration::from_secs(1);

/// Per-connection read timeout.
pub const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-connection write timeout.
pub const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Content larger than this (in bytes, UTF-8 encoded) triggers the spill path.
pub const SPILL_THRESHOLD_BYTES: usize = 10 * 1024;

/// Maximum pending messages per recipient queue.
pub const QUEUE_CAP: usize = 100;

/// Session lifetime after minting.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);

/// How long a name-forward remains valid after a rename.
pub const NAME_FORWARD_TTL: Duration = Duration::from_secs(2 * 3600);

/// Minimum time between two renames of the same identity.
pub const RENAME_COOLDOWN: Duration = Duration::from_secs(3600);

/// Rate limiter sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Requests allowed per identity within [`RATE_LIMIT_WINDOW`].
pub const RATE_LIMIT_MAX_REQUESTS: usize = 100;

/// Messages older than this are purged for recipients that never registered.
pub const MESSAGE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Minimum and maximum length of a valid instance identifier.
pub const IDENTIFIER_MIN_LEN: usize = 1;
pub const IDENTIFIER_MAX_LEN: usize = 32;

/// Synthetic sender used for broker-generated notifications.
pub const SYSTEM_SENDER: &str = "system";

/// Salt used when hashing session tokens for storage. A deployment
/// constant, not a secret: the token itself carries the entropy.
pub const SESSION_TOKEN_SALT: &str = "broker-session-token-v1";
