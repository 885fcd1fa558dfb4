// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Deferred action scheduler
//!
//! UI requests such as "show the menu" or "load this disk" cannot take effect
//! the moment they are made: the sound buffer needs to drain before the menu
//! appears, and the emulator applies resource changes a few frames late, so a
//! load command typed too early gets stuck. The scheduler turns each request
//! into a countdown measured in emulated frames and fires the matching side
//! effect when the countdown expires.
//!
//! [`ActionScheduler::tick`] must be called exactly once per rendered frame.
//! Chained follow-ups (disk/tape load → `RUN`) are armed after every timer has
//! been evaluated, so a chained countdown of N frames needs exactly N further
//! ticks. Stepping it in the same pass that armed it, as the older front end
//! did, would type `RUN` one frame earlier (after N - 1 ticks).

use log::{debug, warn};

use crate::action::ActionKind;
use crate::config::ActionDelays;
use crate::core::{Machine, Resource, TapeControl, View};

/// Program name used when the disk directory does not give us one.
pub const DEFAULT_PROGRAM_NAME: &str = "*";

/// One frame countdown. Zero means idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Countdown(u32);

impl Countdown {
    /// Start counting from `frames`. Refused while already counting.
    fn arm(&mut self, frames: u32) -> bool {
        if self.0 != 0 {
            return false;
        }
        self.0 = frames;
        true
    }

    /// Advance one frame. Returns true on the frame the countdown expires.
    fn step(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        self.0 == 0
    }
}

pub struct ActionScheduler {
    timers: [Countdown; ActionKind::COUNT],
    delays: ActionDelays,
    program_name: String,
}

impl ActionScheduler {
    pub fn new(delays: ActionDelays) -> Self {
        Self {
            timers: [Countdown::default(); ActionKind::COUNT],
            delays,
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
        }
    }

    pub fn delays(&self) -> &ActionDelays {
        &self.delays
    }

    /// Frames left before `kind` fires, zero when idle.
    pub fn remaining(&self, kind: ActionKind) -> u32 {
        self.timers[kind.index()].0
    }

    pub fn is_armed(&self, kind: ActionKind) -> bool {
        self.remaining(kind) != 0
    }

    /// Any countdown still running.
    pub fn is_busy(&self) -> bool {
        self.timers.iter().any(|t| t.0 != 0)
    }

    /// Name typed into the disk load command.
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Set the program the next disk load will ask for. An empty name loads
    /// the first file on the disk.
    pub fn set_program_name(&mut self, name: &str) {
        self.program_name = if name.is_empty() {
            DEFAULT_PROGRAM_NAME.to_string()
        } else {
            name.to_string()
        };
    }

    /// Arm the countdown for `kind` unless it is already running.
    ///
    /// Arming the menu or pause countdown turns the volume down right away so
    /// the buffer is silent by the time the action fires. Returns whether the
    /// request armed a countdown.
    pub fn request_action<M>(&mut self, kind: ActionKind, machine: &mut M) -> bool
    where
        M: Machine + ?Sized,
    {
        let frames = self.delays.frames(kind);
        if !self.timers[kind.index()].arm(frames) {
            debug!("{kind} already pending, request dropped");
            return false;
        }
        debug!("{kind} armed for {frames} frames");

        if kind.mutes_audio() {
            if let Err(err) = machine.set_resource(Resource::SoundVolume, 0) {
                warn!("cannot fade out sound before {kind}: {err}");
            }
        }
        true
    }

    /// Advance every countdown by one frame and fire the ones that expire.
    pub fn tick<M, V>(&mut self, machine: &mut M, view: &mut V)
    where
        M: Machine + ?Sized,
        V: View + ?Sized,
    {
        // Both loads chain to the same follow-up, so one slot is enough.
        let mut chained = None;
        for kind in ActionKind::ALL {
            if self.timers[kind.index()].step() {
                chained = self.fire(kind, machine, view).or(chained);
            }
        }
        if let Some(kind) = chained {
            self.request_action(kind, machine);
        }
    }

    /// Drop every pending action without firing it.
    pub fn reset(&mut self) {
        self.timers = [Countdown::default(); ActionKind::COUNT];
    }

    fn fire<M, V>(&mut self, kind: ActionKind, machine: &mut M, view: &mut V) -> Option<ActionKind>
    where
        M: Machine + ?Sized,
        V: View + ?Sized,
    {
        debug!("{kind} fired");
        match kind {
            ActionKind::ShowMenu => {
                machine.show_menu();
                None
            }
            ActionKind::Pause => {
                machine.set_paused(true);
                view.display_paused(true);
                view.update_view();
                None
            }
            ActionKind::LoadDisk => {
                machine.feed_keyboard(&disk_load_command(&self.program_name));
                Some(ActionKind::KbdCmdRun)
            }
            ActionKind::LoadTape => {
                machine.feed_keyboard("LOAD\r");
                machine.datasette_control(TapeControl::Start);
                Some(ActionKind::KbdCmdRun)
            }
            ActionKind::KbdCmdRun => {
                machine.feed_keyboard("RUN\r");
                None
            }
        }
    }
}

impl Default for ActionScheduler {
    fn default() -> Self {
        Self::new(ActionDelays::default())
    }
}

/// Keyboard text that loads `program` from drive 8.
pub fn disk_load_command(program: &str) -> String {
    format!("LOAD\"{program}\",8,1\r")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessMachine, RecordingView, ViewEvent};
    use pretty_assertions::assert_eq;

    fn setup() -> (ActionScheduler, HeadlessMachine, RecordingView) {
        (
            ActionScheduler::default(),
            HeadlessMachine::new(),
            RecordingView::default(),
        )
    }

    fn run(
        sched: &mut ActionScheduler,
        machine: &mut HeadlessMachine,
        view: &mut RecordingView,
        frames: u32,
    ) {
        for _ in 0..frames {
            sched.tick(machine, view);
        }
    }

    #[test]
    fn rearm_while_pending_is_dropped() {
        let (mut sched, mut machine, mut view) = setup();
        for kind in ActionKind::ALL {
            assert!(sched.request_action(kind, &mut machine));
        }
        sched.tick(&mut machine, &mut view);
        for kind in ActionKind::ALL {
            let before = sched.remaining(kind);
            assert!(!sched.request_action(kind, &mut machine));
            assert_eq!(sched.remaining(kind), before);
        }
    }

    #[test]
    fn fires_after_exactly_n_ticks() {
        let (mut sched, mut machine, mut view) = setup();
        sched.request_action(ActionKind::Pause, &mut machine);
        run(&mut sched, &mut machine, &mut view, 9);
        assert!(!machine.is_paused());
        assert!(view.events.is_empty());

        sched.tick(&mut machine, &mut view);
        assert!(machine.is_paused());
        assert_eq!(
            view.events,
            vec![ViewEvent::Paused(true), ViewEvent::Redraw]
        );

        run(&mut sched, &mut machine, &mut view, 20);
        assert_eq!(view.events.len(), 2);
        assert!(!sched.is_busy());
    }

    #[test]
    fn show_menu_fires_once() {
        let (mut sched, mut machine, mut view) = setup();
        sched.request_action(ActionKind::ShowMenu, &mut machine);
        run(&mut sched, &mut machine, &mut view, 30);
        assert_eq!(machine.menu_traps, 1);
    }

    #[test]
    fn menu_and_pause_mute_at_request_time() {
        for kind in [ActionKind::ShowMenu, ActionKind::Pause] {
            let (mut sched, mut machine, _) = setup();
            assert_eq!(machine.resource(Resource::SoundVolume).unwrap(), 100);
            sched.request_action(kind, &mut machine);
            assert_eq!(machine.resource(Resource::SoundVolume).unwrap(), 0);
        }
    }

    #[test]
    fn loads_do_not_touch_volume() {
        let (mut sched, mut machine, _) = setup();
        sched.request_action(ActionKind::LoadDisk, &mut machine);
        sched.request_action(ActionKind::LoadTape, &mut machine);
        assert_eq!(machine.resource(Resource::SoundVolume).unwrap(), 100);
    }

    #[test]
    fn disk_load_types_command_then_run() {
        let (mut sched, mut machine, mut view) = setup();
        sched.set_program_name("GIANA");
        sched.request_action(ActionKind::LoadDisk, &mut machine);

        run(&mut sched, &mut machine, &mut view, 49);
        assert_eq!(machine.keyboard_buffer, "");

        sched.tick(&mut machine, &mut view);
        assert_eq!(machine.keyboard_buffer, "LOAD\"GIANA\",8,1\r");
        assert_eq!(sched.remaining(ActionKind::KbdCmdRun), 5);

        run(&mut sched, &mut machine, &mut view, 4);
        assert_eq!(machine.keyboard_buffer, "LOAD\"GIANA\",8,1\r");
        sched.tick(&mut machine, &mut view);
        assert_eq!(machine.keyboard_buffer, "LOAD\"GIANA\",8,1\rRUN\r");
    }

    #[test]
    fn tape_load_presses_play() {
        let (mut sched, mut machine, mut view) = setup();
        sched.request_action(ActionKind::LoadTape, &mut machine);
        run(&mut sched, &mut machine, &mut view, 10);
        assert_eq!(machine.keyboard_buffer, "LOAD\r");
        assert_eq!(machine.tape_log, vec![TapeControl::Start]);
        assert!(sched.is_armed(ActionKind::KbdCmdRun));

        run(&mut sched, &mut machine, &mut view, 5);
        assert_eq!(machine.keyboard_buffer, "LOAD\rRUN\r");
    }

    #[test]
    fn chained_run_arms_after_earlier_run_expired() {
        let (mut sched, mut machine, mut view) = setup();
        sched.request_action(ActionKind::KbdCmdRun, &mut machine);
        sched.request_action(ActionKind::LoadTape, &mut machine);
        run(&mut sched, &mut machine, &mut view, 5);
        assert_eq!(machine.keyboard_buffer, "RUN\r");
        run(&mut sched, &mut machine, &mut view, 5);
        // Tape fired and chained a fresh RUN, the previous one had already expired.
        assert_eq!(machine.keyboard_buffer, "RUN\rLOAD\r");
        assert_eq!(sched.remaining(ActionKind::KbdCmdRun), 5);
    }

    #[test]
    fn empty_program_name_loads_first_file() {
        let mut sched = ActionScheduler::default();
        sched.set_program_name("");
        assert_eq!(sched.program_name(), DEFAULT_PROGRAM_NAME);
        assert_eq!(disk_load_command(sched.program_name()), "LOAD\"*\",8,1\r");
    }

    #[test]
    fn reset_drops_pending_actions() {
        let (mut sched, mut machine, mut view) = setup();
        sched.request_action(ActionKind::LoadTape, &mut machine);
        sched.reset();
        assert!(!sched.is_busy());
        run(&mut sched, &mut machine, &mut view, 20);
        assert_eq!(machine.keyboard_buffer, "");
    }

    #[test]
    fn configured_delays_drive_the_chain() {
        let delays = ActionDelays {
            load_tape: 2,
            kbd_cmd_run: 0,
            ..ActionDelays::default()
        };
        let mut sched = ActionScheduler::new(delays);
        let (mut machine, mut view) = (HeadlessMachine::new(), RecordingView::default());
        assert_eq!(sched.delays(), &delays);

        sched.request_action(ActionKind::LoadTape, &mut machine);
        run(&mut sched, &mut machine, &mut view, 2);
        assert_eq!(machine.keyboard_buffer, "LOAD\r");
        // A zero delay still waits one frame.
        assert_eq!(sched.remaining(ActionKind::KbdCmdRun), 1);
        sched.tick(&mut machine, &mut view);
        assert_eq!(machine.keyboard_buffer, "LOAD\rRUN\r");
    }

    #[test]
    fn disk_and_tape_expiring_together_chain_one_run() {
        let delays = ActionDelays {
            load_disk: 3,
            load_tape: 3,
            ..ActionDelays::default()
        };
        let mut sched = ActionScheduler::new(delays);
        let (mut machine, mut view) = (HeadlessMachine::new(), RecordingView::default());
        sched.request_action(ActionKind::LoadDisk, &mut machine);
        sched.request_action(ActionKind::LoadTape, &mut machine);

        run(&mut sched, &mut machine, &mut view, 3);
        assert_eq!(sched.remaining(ActionKind::KbdCmdRun), 5);
        run(&mut sched, &mut machine, &mut view, 10);
        assert_eq!(machine.keyboard_buffer.matches("RUN\r").count(), 1);
    }

    #[test]
    fn idle_tick_is_a_no_op() {
        let (mut sched, mut machine, mut view) = setup();
        run(&mut sched, &mut machine, &mut view, 3);
        assert!(view.events.is_empty());
        assert_eq!(machine.keyboard_buffer, "");
        assert_eq!(machine.menu_traps, 0);
    }
}
