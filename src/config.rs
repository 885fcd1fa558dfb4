// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Controller configuration
//!
//! The frame delays are tuned by hand against the emulator's habit of
//! applying resource changes a few frames after they are requested. With the
//! `serde-config` feature the whole configuration can be read from YAML or
//! JSON; every field is optional and falls back to the defaults below.

use crate::action::ActionKind;

#[cfg(feature = "serde-config")]
use thiserror::Error;

/// Frames to wait before each deferred action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-config", serde(default))]
pub struct ActionDelays {
    /// Long enough for a faded-out audio buffer to play through.
    pub show_menu: u32,
    pub pause: u32,
    /// Drive emulation mode switches need the longest to settle.
    pub load_disk: u32,
    pub load_tape: u32,
    pub kbd_cmd_run: u32,
}

impl ActionDelays {
    /// Countdown for `kind`. Never zero, a zero countdown could not fire.
    pub fn frames(&self, kind: ActionKind) -> u32 {
        let frames = match kind {
            ActionKind::ShowMenu => self.show_menu,
            ActionKind::Pause => self.pause,
            ActionKind::LoadDisk => self.load_disk,
            ActionKind::LoadTape => self.load_tape,
            ActionKind::KbdCmdRun => self.kbd_cmd_run,
        };
        frames.max(1)
    }
}

impl Default for ActionDelays {
    fn default() -> Self {
        Self {
            show_menu: 10,
            pause: 10,
            load_disk: 50,
            load_tape: 10,
            kbd_cmd_run: 5,
        }
    }
}

/// Options for a [`Controller`](crate::controller::Controller).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-config", serde(default))]
pub struct ControllerConfig {
    pub delays: ActionDelays,
    /// Open the menu on the first input scan after boot.
    pub show_menu_on_boot: bool,
    /// Control port the device joystick drives at startup (1 or 2).
    pub joystick_port: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            delays: ActionDelays::default(),
            show_menu_on_boot: true,
            joystick_port: 2,
        }
    }
}

#[cfg(feature = "serde-config")]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("joystick port must be 1 or 2, got {0}")]
    JoystickPort(u8),
}

#[cfg(feature = "serde-config")]
impl ControllerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validated()
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        match self.joystick_port {
            1 | 2 => Ok(self),
            other => Err(ConfigError::JoystickPort(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays() {
        let delays = ActionDelays::default();
        assert_eq!(delays.frames(ActionKind::ShowMenu), 10);
        assert_eq!(delays.frames(ActionKind::Pause), 10);
        assert_eq!(delays.frames(ActionKind::LoadDisk), 50);
        assert_eq!(delays.frames(ActionKind::LoadTape), 10);
        assert_eq!(delays.frames(ActionKind::KbdCmdRun), 5);
    }

    #[test]
    fn zero_delay_is_clamped() {
        let delays = ActionDelays {
            pause: 0,
            ..ActionDelays::default()
        };
        assert_eq!(delays.frames(ActionKind::Pause), 1);
    }

    #[cfg(feature = "serde-config")]
    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ControllerConfig::from_yaml_str("delays:\n  load_disk: 80\njoystick_port: 1\n")
            .expect("valid yaml");
        assert_eq!(config.delays.load_disk, 80);
        assert_eq!(config.delays.kbd_cmd_run, 5);
        assert_eq!(config.joystick_port, 1);
        assert!(config.show_menu_on_boot);
    }

    #[cfg(feature = "serde-config")]
    #[test]
    fn json_rejects_bad_port() {
        let result = ControllerConfig::from_json_str(r#"{"joystick_port": 3}"#);
        assert!(matches!(result, Err(ConfigError::JoystickPort(3))));
    }
}
