//! Command parsing and validation
//!
//! Both functions here are pure: the same input always produces the same
//! classification, so client and server can share them.

use crate::error::{CommandError, PrereqViolation};
use crate::protocol::commands::{Command, Verb};

/// Parse a raw line into a `Command`, checking the verb and its argument count.
pub fn parse_command(raw: &str) -> Result<Command, CommandError> {
    let mut tokens = raw.split_whitespace();
    let token = tokens.next().unwrap_or("");
    let verb =
        Verb::from_token(token).ok_or_else(|| CommandError::UnknownCommand(token.to_string()))?;

    let args: Vec<&str> = tokens.collect();
    if !verb.arity().accepts(args.len()) {
        return Err(CommandError::ArityMismatch(verb.token().to_string()));
    }

    let command = match verb {
        Verb::Join => Command::Join {
            host: args[0].to_string(),
            port: args[1].to_string(),
        },
        Verb::Leave => Command::Leave,
        Verb::Register => Command::Register(args[0].to_string()),
        Verb::Dir => Command::Dir,
        Verb::Store => Command::Store(args[0].to_string()),
        Verb::Get => Command::Get(args[0].to_string()),
        Verb::Broadcast => Command::Broadcast(args.join(" ")),
        Verb::Message => Command::Message {
            handle: args[0].to_string(),
            text: args[1..].join(" "),
        },
        Verb::Help => Command::Help,
    };

    Ok(command)
}

/// Snapshot of the state a prerequisite check needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub connected: bool,
    pub registered: bool,
}

/// Checks whether `command` may be issued in the state described by `flags`.
pub fn check_prerequisites(command: &Command, flags: SessionFlags) -> Result<(), PrereqViolation> {
    let verb = command.verb();

    match verb {
        Verb::Help => return Ok(()),
        Verb::Join if flags.connected => return Err(PrereqViolation::AlreadyConnected),
        Verb::Join => return Ok(()),
        _ => {}
    }

    if !flags.connected {
        return Err(PrereqViolation::NotConnected);
    }

    if verb == Verb::Register && flags.registered {
        return Err(PrereqViolation::AlreadyRegistered);
    }

    if verb.requires_registration() && !flags.registered {
        return Err(PrereqViolation::NotRegistered);
    }

    Ok(())
}
