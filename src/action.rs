//! Deferred action kinds
//!
//! Every UI request that has to wait for the emulator to settle before it can
//! take effect is one of these kinds. Each kind owns exactly one countdown in
//! the [`ActionScheduler`](crate::scheduler::ActionScheduler).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ActionKind {
    /// Bring up the menu once the audio buffer has drained.
    ShowMenu = 0,
    /// Pause emulation once the audio buffer has drained.
    Pause = 1,
    /// Type the disk load command.
    LoadDisk = 2,
    /// Type the tape load command and press play.
    LoadTape = 3,
    /// Type `RUN` after a load command.
    KbdCmdRun = 4,
}

impl ActionKind {
    pub const COUNT: usize = 5;

    pub const ALL: [ActionKind; Self::COUNT] = [
        ActionKind::ShowMenu,
        ActionKind::Pause,
        ActionKind::LoadDisk,
        ActionKind::LoadTape,
        ActionKind::KbdCmdRun,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Kinds that fade the sound out when they are armed.
    pub fn mutes_audio(self) -> bool {
        matches!(self, ActionKind::ShowMenu | ActionKind::Pause)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::ShowMenu => "show-menu",
            ActionKind::Pause => "pause",
            ActionKind::LoadDisk => "load-disk",
            ActionKind::LoadTape => "load-tape",
            ActionKind::KbdCmdRun => "run-command",
        };
        f.write_str(name)
    }
}
