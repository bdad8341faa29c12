//! Terminal commands.

use std::str::FromStr;

pub const HELP: &str = "\
commands:
  connect   retry connecting (e.g. after changing settings)
  ack       dismiss the oldest open dialog
  status    show the connection indicator and attempt state
  log       show the session log
  notices   list queued dialogs and notifications
  dismiss N remove notice #N
  quit      disconnect and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Ack,
    Status,
    Log,
    Notices,
    Dismiss(u64),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command `{0}`, type `help` for a list")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(arg) = s.strip_prefix("dismiss") {
            let arg = arg.trim().trim_start_matches('#');
            return arg
                .parse()
                .map(Command::Dismiss)
                .map_err(|_| UnknownCommand(s.clone()));
        }
        match s.as_str() {
            "connect" | "reconnect" => Ok(Command::Connect),
            "ack" | "ok" => Ok(Command::Ack),
            "status" => Ok(Command::Status),
            "log" => Ok(Command::Log),
            "notices" => Ok(Command::Notices),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}
