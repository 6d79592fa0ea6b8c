//! Operator commands.
//!
//! Console input arrives on its own thread and is turned into `Command`
//! events on a channel. The loop drains the channel once per tick into a
//! `Signals` snapshot, so only the loop thread ever touches the sequencer.

use std::io::BufRead;
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `S`: start the countdown.
    Arm,
    /// `A`: abort from any state.
    Abort,
    /// `T`: toggle the per-sample load-cell print.
    ToggleDiagnostic,
}

impl Command {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'S' => Some(Self::Arm),
            'A' => Some(Self::Abort),
            'T' => Some(Self::ToggleDiagnostic),
            _ => None,
        }
    }

    /// Every command letter in a console line, in order.
    pub fn parse_line(line: &str) -> impl Iterator<Item = Self> + '_ {
        line.chars().filter_map(Self::from_char)
    }
}

/// What the loop acts on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub arm: bool,
    pub abort: bool,
    /// Odd number of toggles since the last drain.
    pub toggle_diagnostic: bool,
}

impl Signals {
    pub const NONE: Self = Self {
        arm: false,
        abort: false,
        toggle_diagnostic: false,
    };

    pub fn arm() -> Self {
        Self {
            arm: true,
            ..Self::NONE
        }
    }

    pub fn abort() -> Self {
        Self {
            abort: true,
            ..Self::NONE
        }
    }

    pub fn merge(&mut self, cmd: Command) {
        match cmd {
            Command::Arm => self.arm = true,
            Command::Abort => self.abort = true,
            Command::ToggleDiagnostic => self.toggle_diagnostic = !self.toggle_diagnostic,
        }
    }
}

/// Producer side; cheap to clone into reader threads and signal handlers.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: xch::Sender<Command>,
}

impl CommandSender {
    /// `false` once the loop has gone away.
    pub fn send(&self, cmd: Command) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

/// Consumer side, owned by the loop.
#[derive(Debug)]
pub struct CommandInbox {
    rx: xch::Receiver<Command>,
}

impl CommandInbox {
    /// Everything queued since the last call, folded into one snapshot.
    pub fn drain(&self) -> Signals {
        let mut signals = Signals::NONE;
        for cmd in self.rx.try_iter() {
            debug!(?cmd, "command");
            signals.merge(cmd);
        }
        signals
    }
}

pub fn command_channel() -> (CommandSender, CommandInbox) {
    let (tx, rx) = xch::unbounded();
    (CommandSender { tx }, CommandInbox { rx })
}

/// Read console lines on a background thread until EOF or until the loop
/// hangs up.
pub fn spawn_console_reader<R>(reader: R, tx: CommandSender) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                for cmd in Command::parse_line(&line) {
                    info!(?cmd, "operator command");
                    if !tx.send(cmd) {
                        return;
                    }
                }
            }
            debug!("console reader exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn letters_map_to_commands() {
        let cmds: Vec<_> = Command::parse_line("s x A t?").collect();
        assert_eq!(
            cmds,
            [Command::Arm, Command::Abort, Command::ToggleDiagnostic]
        );
    }

    #[test]
    fn drain_folds_queue_into_one_snapshot() {
        let (tx, inbox) = command_channel();
        assert_eq!(inbox.drain(), Signals::NONE);
        tx.send(Command::ToggleDiagnostic);
        tx.send(Command::Arm);
        tx.send(Command::ToggleDiagnostic);
        tx.send(Command::ToggleDiagnostic);
        let s = inbox.drain();
        assert!(s.arm && !s.abort && s.toggle_diagnostic);
        assert_eq!(inbox.drain(), Signals::NONE);
    }

    #[test]
    fn console_reader_forwards_until_eof() {
        let (tx, inbox) = command_channel();
        let handle = spawn_console_reader(Cursor::new("S\n\nA\n"), tx).unwrap();
        handle.join().unwrap();
        assert_eq!(inbox.drain(), Signals { arm: true, abort: true, toggle_diagnostic: false });
    }

    #[test]
    fn send_reports_closed_loop() {
        let (tx, inbox) = command_channel();
        drop(inbox);
        assert!(!tx.send(Command::Abort));
    }
}
