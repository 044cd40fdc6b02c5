//! Reply texts
//!
//! Builders and recognizers for the lines exchanged between client and server.
//! Several of these must stay byte-for-byte stable for compatibility.

pub const CONNECTION_CLOSED: &str = "Connection closed. Thank you!";
pub const CONNECTION_CLOSED_PREFIX: &str = "Connection closed.";
pub const FILE_NOT_FOUND: &str = "Error: File not found in the server.";
pub const DIRECTORY_HEADER: &str = "Server Directory";
pub const COMMAND_TOO_LONG: &str = "Error: Command too long.";
pub const STORE_FAILED: &str = "Error: Could not store the file.";
pub const FILE_TOO_LARGE: &str = "Error: File exceeds the server size limit.";
pub const LIST_FAILED: &str = "Error: Could not read the server directory.";
pub const READ_FAILED: &str = "Error: Could not read the file in the server.";
pub const INVALID_INPUT: &str = "Error: Invalid Input. Enter /? for help.";
pub const CONNECTION_LOST: &str = "Error: Connection to the server lost.";

const WELCOME_PREFIX: &str = "Welcome ";
const FILE_ANNOUNCEMENT_PREFIX: &str = "File received from Server: ";

pub const SERVER_HELP: &str = "\
Disconnect from the server application: /leave
Register a unique handle or alias: /register <handle>
Send file to server: /store <filename>
Request directory file list from a server: /dir
Fetch a file from a server: /get <filename>
Send a message to all registered users: /broadcast <message>
Send a message to one registered user: /message <handle> <message>
Request command help to output all Input: /?";

pub const OFFLINE_HELP: &str = "Connect to the server application: /join <server_ip_add> <port>";

pub fn welcome(handle: &str) -> String {
    format!("{WELCOME_PREFIX}{handle}!")
}

/// Extracts the handle from a `Welcome <handle>!` line.
pub fn parse_welcome(line: &str) -> Option<&str> {
    line.strip_prefix(WELCOME_PREFIX)?
        .strip_suffix('!')
        .filter(|handle| !handle.is_empty() && !handle.contains(char::is_whitespace))
}

pub fn is_connection_closed(line: &str) -> bool {
    line.starts_with(CONNECTION_CLOSED_PREFIX)
}

/// Header line preceding a server-to-client payload.
pub fn file_announcement(filename: &str) -> String {
    format!("{FILE_ANNOUNCEMENT_PREFIX}{filename}")
}

pub fn parse_file_announcement(line: &str) -> Option<&str> {
    line.strip_prefix(FILE_ANNOUNCEMENT_PREFIX)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Header line preceding a client-to-server payload. Reuses the command verb.
pub fn store_announcement(filename: &str) -> String {
    format!("/store {filename}")
}

pub fn stored(filename: &str) -> String {
    format!("File stored in the server: {filename}")
}

/// `/dir` reply: the header followed by one name per line.
pub fn directory_listing(names: &[String]) -> String {
    let mut listing = String::from(DIRECTORY_HEADER);
    for name in names {
        listing.push('\n');
        listing.push_str(name);
    }
    listing
}

pub fn broadcast_line(sender: &str, text: &str) -> String {
    format!("[broadcast] {sender}: {text}")
}

pub fn whisper_line(sender: &str, text: &str) -> String {
    format!("[{sender} whispers]: {text}")
}

pub fn broadcast_sent(recipients: usize) -> String {
    format!("Broadcast sent to {recipients} user(s).")
}

pub fn message_sent(handle: &str) -> String {
    format!("Message sent to {handle}.")
}
