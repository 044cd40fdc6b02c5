//! Module `commands`
//!
//! Defines the command table of the exchange protocol: the verbs, how many
//! arguments each one takes, and the parsed `Command` representation.

use std::fmt;

/// Every verb understood by client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Join,
    Leave,
    Register,
    Dir,
    Store,
    Get,
    Broadcast,
    Message,
    Help,
}

/// Number of arguments a verb accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl Verb {
    pub const ALL: [Verb; 9] = [
        Verb::Join,
        Verb::Leave,
        Verb::Register,
        Verb::Dir,
        Verb::Store,
        Verb::Get,
        Verb::Broadcast,
        Verb::Message,
        Verb::Help,
    ];

    /// Looks up a verb by its wire token. Tokens are case-sensitive.
    pub fn from_token(token: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|verb| verb.token() == token)
    }

    pub fn token(&self) -> &'static str {
        match self {
            Verb::Join => "/join",
            Verb::Leave => "/leave",
            Verb::Register => "/register",
            Verb::Dir => "/dir",
            Verb::Store => "/store",
            Verb::Get => "/get",
            Verb::Broadcast => "/broadcast",
            Verb::Message => "/message",
            Verb::Help => "/?",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Verb::Join => Arity::Exactly(2),
            Verb::Leave | Verb::Dir | Verb::Help => Arity::Exactly(0),
            Verb::Register | Verb::Store | Verb::Get => Arity::Exactly(1),
            Verb::Broadcast => Arity::AtLeast(1),
            Verb::Message => Arity::AtLeast(2),
        }
    }

    /// Verbs that only a registered session may issue.
    pub fn requires_registration(&self) -> bool {
        matches!(
            self,
            Verb::Dir | Verb::Store | Verb::Get | Verb::Broadcast | Verb::Message
        )
    }
}

/// A validated command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join { host: String, port: String },
    Leave,
    Register(String),
    Dir,
    Store(String),
    Get(String),
    Broadcast(String),
    Message { handle: String, text: String },
    Help,
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::Join { .. } => Verb::Join,
            Command::Leave => Verb::Leave,
            Command::Register(_) => Verb::Register,
            Command::Dir => Verb::Dir,
            Command::Store(_) => Verb::Store,
            Command::Get(_) => Verb::Get,
            Command::Broadcast(_) => Verb::Broadcast,
            Command::Message { .. } => Verb::Message,
            Command::Help => Verb::Help,
        }
    }
}

/// Renders the command as the line sent on the wire.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb().token();
        match self {
            Command::Join { host, port } => write!(f, "{verb} {host} {port}"),
            Command::Register(arg)
            | Command::Store(arg)
            | Command::Get(arg)
            | Command::Broadcast(arg) => write!(f, "{verb} {arg}"),
            Command::Message { handle, text } => write!(f, "{verb} {handle} {text}"),
            Command::Leave | Command::Dir | Command::Help => f.write_str(verb),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_verb_round_trips_through_its_token() {
        for verb in Verb::ALL {
            assert_eq!(Verb::from_token(verb.token()), Some(verb));
        }
    }

    #[test]
    fn tokens_are_case_sensitive() {
        assert_eq!(Verb::from_token("/REGISTER"), None);
        assert_eq!(Verb::from_token("register"), None);
    }

    #[test]
    fn display_renders_wire_line() {
        let command = Command::Message {
            handle: "bob".to_string(),
            text: "see you at noon".to_string(),
        };
        assert_eq!(command.to_string(), "/message bob see you at noon");
        assert_eq!(Command::Help.to_string(), "/?");
        assert_eq!(
            Command::Store("report.txt".to_string()).to_string(),
            "/store report.txt"
        );
    }

    #[test]
    fn arity_table() {
        assert!(Verb::Join.arity().accepts(2));
        assert!(!Verb::Join.arity().accepts(1));
        assert!(Verb::Broadcast.arity().accepts(5));
        assert!(!Verb::Broadcast.arity().accepts(0));
        assert!(Verb::Message.arity().accepts(2));
        assert!(!Verb::Message.arity().accepts(1));
        assert!(Verb::Help.arity().accepts(0));
    }
}
