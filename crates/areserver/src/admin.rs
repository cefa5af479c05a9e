//! Admin console: operator commands marshalled onto the tick loop.
//!
//! Commands never touch the world directly. They are parsed wherever they
//! come from (stdin, tests), queued on an unbounded channel, and executed
//! by the server loop after that tick's transport events.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// An operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// List the available commands.
    Help,
    /// Log every active player.
    Players,
    /// Rebuild the map from the default layout and resend it to everyone.
    Regen,
    /// Stop the server loop.
    Quit,
}

/// One row of the command table.
#[derive(Debug)]
pub struct CommandEntry {
    pub name: &'static str,
    pub help: &'static str,
    pub command: AdminCommand,
}

/// Every command the console understands.
pub const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        name: "help",
        help: "list commands",
        command: AdminCommand::Help,
    },
    CommandEntry {
        name: "players",
        help: "list active players",
        command: AdminCommand::Players,
    },
    CommandEntry {
        name: "regen",
        help: "regenerate the map and resend it to all clients",
        command: AdminCommand::Regen,
    },
    CommandEntry {
        name: "quit",
        help: "stop the server",
        command: AdminCommand::Quit,
    },
];

impl AdminCommand {
    /// Looks a command line up in [`COMMANDS`].
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive.
    /// Anything after the command word is ignored too.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.split_whitespace().next()?;
        COMMANDS
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(word))
            .map(|entry| entry.command)
    }
}

/// Cloneable handle for queueing admin commands.
#[derive(Debug, Clone)]
pub struct AdminHandle {
    tx: mpsc::UnboundedSender<AdminCommand>,
}

impl AdminHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<AdminCommand>) -> Self {
        Self { tx }
    }

    /// Queues a command for the next drain. Returns `false` once the server
    /// loop has stopped.
    pub fn send(&self, command: AdminCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Reads stdin line by line and queues every recognised command.
///
/// Ends at EOF, or once the server loop stops listening.
pub async fn read_stdin_commands(handle: AdminHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("admin console closed (EOF)");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "admin console read failed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match AdminCommand::parse(&line) {
            Some(command) => {
                if !handle.send(command) {
                    return;
                }
            }
            None => {
                tracing::warn!(input = %line.trim(), "unknown command, try `help`");
            }
        }
    }
}
