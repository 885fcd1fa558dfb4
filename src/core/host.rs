// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Adapter traits for the emulator core and the view layer.
//!
//! The controller never talks to the emulator or the UI directly. Everything
//! it needs goes through [`Machine`] and [`View`], which keeps the scheduler
//! and the snapshot codec free of the emulator's calling convention.

use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use thiserror::Error;

use crate::snapshot::SnapshotError;

bitflags! {
    /// Joystick pins as seen by the emulated control port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JoyPins: u8 {
        const UP = 0x01;
        const DOWN = 0x02;
        const LEFT = 0x04;
        const RIGHT = 0x08;
        const FIRE = 0x10;
    }
}

/// Datasette transport commands, numbered as the emulator numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TapeControl {
    Stop = 0,
    Start = 1,
    Forward = 2,
    Rewind = 3,
    Record = 4,
    Reset = 5,
    ResetCounter = 6,
}

impl TryFrom<u8> for TapeControl {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TapeControl::Stop),
            1 => Ok(TapeControl::Start),
            2 => Ok(TapeControl::Forward),
            3 => Ok(TapeControl::Rewind),
            4 => Ok(TapeControl::Record),
            5 => Ok(TapeControl::Reset),
            6 => Ok(TapeControl::ResetCounter),
            other => Err(other),
        }
    }
}

/// Cartridge commands available from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartControl {
    Freeze,
    SetDefault,
    FlushImage,
    SaveImage,
}

/// Media slots the controller can attach images to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peripheral {
    Drive8,
    Datasette,
    Cartridge,
}

/// Settings the view is told about when they change underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Drive8,
    Datasette,
    Cartridge,
    JoystickPort,
}

impl From<Peripheral> for Setting {
    fn from(peripheral: Peripheral) -> Self {
        match peripheral {
            Peripheral::Drive8 => Setting::Drive8,
            Peripheral::Datasette => Setting::Datasette,
            Peripheral::Cartridge => Setting::Cartridge,
        }
    }
}

/// Integer resources of the emulator core touched by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    WarpMode,
    SoundVolume,
    JoyPort1Device,
    JoyPort2Device,
    CartridgeReset,
}

/// Failures reported by the emulator core.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("resource {0:?} is not available")]
    Resource(Resource),
    #[error("cannot attach {peripheral:?} image {path}")]
    Attach { peripheral: Peripheral, path: PathBuf },
    #[error("autostart of {0} failed")]
    Autostart(PathBuf),
    #[error("tape seek to file {0} failed")]
    TapeSeek(usize),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The emulator core, seen from the controller.
pub trait Machine {
    /// Name the emulator writes into (and expects from) snapshot headers.
    fn machine_name(&self) -> &str;

    fn resource(&self, resource: Resource) -> Result<i32, MachineError>;
    fn set_resource(&mut self, resource: Resource, value: i32) -> Result<(), MachineError>;

    /// Queue text into the emulated keyboard buffer.
    fn feed_keyboard(&mut self, text: &str);
    /// Press or release a key-matrix cell. Negative rows address the
    /// keys wired outside the matrix.
    fn set_key(&mut self, row: i8, column: u8, pressed: bool);
    fn clear_key_matrix(&mut self);
    fn set_joystick(&mut self, port: u8, pins: JoyPins, pressed: bool);

    fn datasette_control(&mut self, control: TapeControl);
    fn tape_attached(&self) -> bool;
    fn tape_seek(&mut self, index: usize) -> Result<(), MachineError>;

    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);
    /// Trap into the menu from the emulation loop.
    fn show_menu(&mut self);

    /// Raw directory entry name for `index` on a disk image, `None` for
    /// index 0 or when the entry does not exist.
    fn disk_file_name(&self, image: &Path, index: usize) -> Option<Vec<u8>>;
    fn autostart(&mut self, image: &Path, index: usize) -> Result<(), MachineError>;

    fn read_snapshot(&mut self, path: &Path) -> Result<(), MachineError>;
    fn write_snapshot(&mut self, path: &Path) -> Result<(), MachineError>;

    /// Attach an image and return its content listing, if the medium has one.
    fn attach_image(&mut self, peripheral: Peripheral, image: &Path)
    -> Result<Vec<String>, MachineError>;
    fn detach_image(&mut self, peripheral: Peripheral);
    fn cartridge_file(&self) -> Option<PathBuf>;
    fn cart_control(&mut self, control: CartControl);

    fn reset(&mut self);
    fn resume_sound(&mut self);
}

/// The UI layer, seen from the controller.
pub trait View {
    fn update_view(&mut self);
    fn display_paused(&mut self, paused: bool);
    fn activate_menu(&mut self);
    fn toggle_keyboard(&mut self);
    /// Whether the view has something to draw that the emulator won't trigger.
    fn pending_redraw(&self) -> bool;
    fn on_setting_changed(
        &mut self,
        setting: Setting,
        value: &str,
        source: &str,
        values: &[String],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_control_codes_round_trip() {
        for code in 0..=6u8 {
            let control = TapeControl::try_from(code).expect("known code");
            assert_eq!(control as u8, code);
        }
        assert_eq!(TapeControl::try_from(7), Err(7));
    }

    #[test]
    fn peripheral_maps_to_setting() {
        assert_eq!(Setting::from(Peripheral::Drive8), Setting::Drive8);
        assert_eq!(Setting::from(Peripheral::Datasette), Setting::Datasette);
        assert_eq!(Setting::from(Peripheral::Cartridge), Setting::Cartridge);
    }
}
