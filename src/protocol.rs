//! Shared protocol constants for the burrow control channel

// Login handshake
pub const PROMPT_USERNAME: &str = "ENTER USERNAME: \n";
pub const PROMPT_PASSWORD: &str = "ENTER PASSWORD: \n";

// Longest command or credential line accepted (bytes, excluding the newline)
pub const MAX_LINE_LEN: usize = 4096;

// Transfer frame header: i64 little-endian payload length
pub const FRAME_HEADER_LEN: usize = 8;

// Copy buffer used for both transfer directions
pub const COPY_BUF_SIZE: usize = 256 * 1024;

pub const DEFAULT_BIND: &str = "0.0.0.0:2121";
pub const DEFAULT_USERS_DB: &str = "./users.json";

// Fixed reply lines. Replies that carry a name are built in `reply`.
pub mod replies {
    pub const LOGGED_IN: &str = "230 User logged in, proceed.\r\n";
    pub const LOGIN_INCORRECT: &str = "530 Login incorrect.\r\n";
    pub const HOME_UNAVAILABLE: &str = "550 Home directory unavailable.\r\n";
    pub const GOODBYE: &str = "221 Goodbye.\r\n";
    pub const UNKNOWN_COMMAND: &str = "500 Unknown command.\r\n";
    pub const MISSING_ARGUMENT: &str = "501 Missing argument.\r\n";
    pub const INVALID_DIR_NAME: &str = "501 Invalid directory name.\r\n";
    pub const INVALID_LENGTH: &str = "501 Invalid transfer length.\r\n";
    pub const ACCESS_DENIED: &str = "550 Access denied.\r\n";
    pub const NOT_A_DIRECTORY: &str = "550 Directory does not exist or is not a directory.\r\n";
    pub const FILE_NOT_FOUND: &str = "550 File not found.\r\n";
    pub const NOT_A_FILE: &str = "550 Not a regular file.\r\n";
    pub const FILE_CREATED: &str = "150 File created.\r\n";
}

/// Reply builders for messages that embed a name or a count.
pub mod reply {
    pub fn directory_changed(display: &str) -> String {
        format!("250 Directory changed to {}\r\n", display)
    }

    pub fn current_directory(display: &str) -> String {
        format!("257 \"{}\" is the current directory\r\n", display)
    }

    pub fn file_removed(name: &str) -> String {
        format!("250 File {} removed.\r\n", name)
    }

    pub fn upload_complete(name: &str) -> String {
        format!("226 File {} uploaded successfully.\r\n", name)
    }

    pub fn listing_complete(entries: usize) -> String {
        format!("226 Listing complete ({} entries).\r\n", entries)
    }

    pub fn dir_created(name: &str) -> String {
        format!("Directory {} created successfully\r\n", name)
    }

    pub fn dir_exists(name: &str) -> String {
        format!("Directory {} already exists\r\n", name)
    }

    pub fn dir_removed(name: &str) -> String {
        format!("Directory {} and its content deleted successfully\r\n", name)
    }

    pub fn dir_missing(name: &str) -> String {
        format!("Directory {} does not exist\r\n", name)
    }

    pub fn error(code: u16, context: &str, detail: impl std::fmt::Display) -> String {
        format!("{} {}: {}\r\n", code, context, detail)
    }
}

// Reply code prefixes the client keys on
pub mod codes {
    pub const LOGGED_IN: &str = "230";
    pub const FILE_CREATED: &str = "150";
    pub const TRANSFER_DONE: &str = "226";
    pub const LISTING_DONE: &str = "226 Listing";
    pub const FAILURE: &str = "550 ";
}

// Timeouts applied to the control socket
pub mod timeouts {
    // Default idle timeout for a session (seconds); 0 disables it
    pub const IDLE_SECS: u64 = 300;

    // Client connect timeout (ms)
    pub const CONNECT_MS: u64 = 5_000;
}
