// crates/engine-types/src/command.rs
//
// EngineCommand: reified transport operations for the Command Queue (§4.H),
// grounded on the teacher's EditorCommand enum pattern (one variant per
// user-facing verb, dispatched through a single executor) but with the
// priority classification and completion-handle machinery §4.H adds.

use std::time::Duration;

use uuid::Uuid;

use crate::state::EndOfStreamAction;

/// Execution class a command belongs to (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPriority {
    /// Play, Pause, Stop, SetSpeedRatio: coalesce consecutive duplicates;
    /// pre-empt a pending (not yet started) Seek.
    Direct,
    /// Seek: replaces any queued Seek with the newest target, cancels an
    /// in-flight Seek's remaining work.
    Priority,
    /// Open, Close, ChangeMedia: drains the queue, stops workers to idle,
    /// executes exclusively, restarts workers.
    Blocking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub source: String,
    pub config: crate::container_config::ContainerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub target: Duration,
}

/// Body of a reified command (§4.H). `Uuid` ids let the queue coalesce and
/// cancel without comparing full payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Open { id: Uuid, request: OpenRequest },
    Close { id: Uuid },
    Play { id: Uuid },
    Pause { id: Uuid },
    Stop { id: Uuid },
    Seek { id: Uuid, request: SeekRequest },
    ChangeMedia { id: Uuid, request: OpenRequest },
    SetSpeedRatio { id: Uuid, ratio: f64 },
    SetVolume { id: Uuid, volume: f64 },
    SetBalance { id: Uuid, balance: f64 },
    SetMuted { id: Uuid, muted: bool },
    SetEndOfStreamAction { id: Uuid, action: EndOfStreamAction },
}

impl EngineCommand {
    pub fn id(&self) -> Uuid {
        match self {
            EngineCommand::Open { id, .. }
            | EngineCommand::Close { id }
            | EngineCommand::Play { id }
            | EngineCommand::Pause { id }
            | EngineCommand::Stop { id }
            | EngineCommand::Seek { id, .. }
            | EngineCommand::ChangeMedia { id, .. }
            | EngineCommand::SetSpeedRatio { id, .. }
            | EngineCommand::SetVolume { id, .. }
            | EngineCommand::SetBalance { id, .. }
            | EngineCommand::SetMuted { id, .. }
            | EngineCommand::SetEndOfStreamAction { id, .. } => *id,
        }
    }

    pub fn priority(&self) -> CommandPriority {
        match self {
            EngineCommand::Open { .. }
            | EngineCommand::Close { .. }
            | EngineCommand::ChangeMedia { .. } => CommandPriority::Blocking,
            EngineCommand::Seek { .. } => CommandPriority::Priority,
            _ => CommandPriority::Direct,
        }
    }

    /// Direct commands coalesce by discriminant: a newly queued `Play`
    /// supersedes an older queued `Play`, etc. (§4.H).
    pub fn coalesce_key(&self) -> Option<&'static str> {
        match self {
            EngineCommand::Play { .. }          => Some("play"),
            EngineCommand::Pause { .. }         => Some("pause"),
            EngineCommand::Stop { .. }          => Some("stop"),
            EngineCommand::SetSpeedRatio { .. } => Some("set_speed_ratio"),
            EngineCommand::SetVolume { .. }     => Some("set_volume"),
            EngineCommand::SetBalance { .. }    => Some("set_balance"),
            EngineCommand::SetMuted { .. }      => Some("set_muted"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_commands_are_classified() {
        let id = Uuid::nil();
        assert_eq!(EngineCommand::Close { id }.priority(), CommandPriority::Blocking);
        assert_eq!(
            EngineCommand::Seek { id, request: SeekRequest { target: Duration::ZERO } }.priority(),
            CommandPriority::Priority
        );
        assert_eq!(EngineCommand::Play { id }.priority(), CommandPriority::Direct);
    }

    #[test]
    fn direct_commands_share_coalesce_keys_by_kind() {
        let id1 = Uuid::nil();
        let id2 = Uuid::max();
        assert_eq!(
            EngineCommand::Play { id: id1 }.coalesce_key(),
            EngineCommand::Play { id: id2 }.coalesce_key()
        );
    }

    #[test]
    fn blocking_and_priority_commands_have_no_coalesce_key() {
        let id = Uuid::nil();
        assert_eq!(EngineCommand::Close { id }.coalesce_key(), None);
        assert_eq!(
            EngineCommand::Seek { id, request: SeekRequest { target: Duration::ZERO } }.coalesce_key(),
            None
        );
    }
}
