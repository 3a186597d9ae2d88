//! CLI utilities for querywire.
//!
//! Parses what a user types at the client prompt into a [`Command`]. Lines starting with a
//! dot are client commands; anything else is a statement sent to the server as a direct
//! Cypher query.
//!
//! # Example
//! ```rust
//! use querywire::{Compression, Format, cli::Command};
//!
//! let cmd = Command::try_from(".format bson best").unwrap();
//! assert_eq!(
//!     cmd,
//!     Command::Format {
//!         format: Format::Bson,
//!         compression: Compression::Best
//!     }
//! );
//! ```
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{
    codec::{Compression, Format},
    error::ConfigurationError,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments {
        command: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("no command provided")]
    Empty,

    #[error("failed to read command: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `.exit`, also produced at end of input
    Exit,
    /// `.ping`
    Ping,
    /// `.format <format> <compression>`
    Format {
        format: Format,
        compression: Compression,
    },
    /// Cypher statement
    Statement(String),
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let line = value.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            None => Err(CommandError::Empty),
            Some(".exit") => Ok(Command::Exit),
            Some(".ping") => Ok(Command::Ping),
            Some(".format") => {
                let (Some(format), Some(compression), None) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(CommandError::InvalidCommandArguments {
                        command: ".format",
                        reason: "requires a format and a compression level. Example: .format json fastest"
                            .to_string(),
                    });
                };

                Ok(Command::Format {
                    format: format.parse()?,
                    compression: compression.parse()?,
                })
            }
            Some(s) if s.starts_with('.') => Err(CommandError::UnrecognizedCommand(s.to_string())),
            Some(_) => Ok(Command::Statement(line.to_string())),
        }
    }
}

/// Prompt user for a command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }

    Command::try_from(s.as_str())
}
