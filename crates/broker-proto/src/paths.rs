//! Default filesystem locations for broker-owned state.

use std::path::PathBuf;

/// Application directory name under the platform data directory.
const APP_DIR: &str = "broker";

/// Database filename within the data directory.
const DB_FILE: &str = "messages.db";

/// Subdirectory holding spilled large-message files.
const LARGE_MESSAGE_DIR: &str = "large-messages";

/// Default data directory: `XDG_DATA_HOME/broker` (`~/.local/share/broker`
/// on Linux), falling back to `~/.claude-ipc-data`-style dotdir under the
/// home directory if no platform data directory can be determined.
pub fn default_data_dir() -> PathBuf {
	if let Some(dir) = dirs::data_dir() {
		return dir.join(APP_DIR);
	}
	dirs::home_dir()
		.unwrap_or_else(std::env::temp_dir)
		.join(".broker-data")
}

/// Path to the persistence database file within a data directory.
pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
	data_dir.join(DB_FILE)
}

/// Path to the directory that holds spilled large-message files.
pub fn large_message_dir(data_dir: &std::path::Path) -> PathBuf {
	data_dir.join(LARGE_MESSAGE_DIR)
}
