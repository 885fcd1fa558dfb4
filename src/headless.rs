// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Headless collaborators
//!
//! [`HeadlessMachine`] stands in for the emulator core: it keeps resources,
//! the keyboard buffer, the key matrix and attached media in memory and
//! writes real snapshot files. [`RecordingView`] logs every call the
//! controller makes into the view. The demo binary and the tests drive the
//! controller through these.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::debug;

use crate::core::{
    CartControl, JoyPins, Machine, MachineError, Peripheral, Resource, Setting, TapeControl, View,
};
use crate::snapshot::{Snapshot, SnapshotWriter};

const RAM_SIZE: usize = 0x10000;

pub struct HeadlessMachine {
    pub name: String,
    resources: HashMap<Resource, i32>,
    /// Everything fed to the keyboard buffer, in order.
    pub keyboard_buffer: String,
    pub pressed_keys: HashSet<(i8, u8)>,
    pub joysticks: [JoyPins; 2],
    pub tape_log: Vec<TapeControl>,
    pub tape_position: usize,
    pub paused: bool,
    pub menu_traps: u32,
    pub resets: u32,
    pub sound_resumes: u32,
    pub cart_log: Vec<CartControl>,
    pub autostarts: Vec<(PathBuf, usize)>,
    pub snapshots_read: Vec<PathBuf>,
    media: HashMap<Peripheral, PathBuf>,
    directories: HashMap<PathBuf, Vec<Vec<u8>>>,
    pub ram: Vec<u8>,
}

impl HeadlessMachine {
    pub const DEFAULT_NAME: &'static str = "C64SC";

    pub fn new() -> Self {
        let resources = HashMap::from([
            (Resource::WarpMode, 0),
            (Resource::SoundVolume, 100),
            (Resource::JoyPort1Device, 0),
            (Resource::JoyPort2Device, 1),
            (Resource::CartridgeReset, 1),
        ]);
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            resources,
            keyboard_buffer: String::new(),
            pressed_keys: HashSet::new(),
            joysticks: [JoyPins::empty(); 2],
            tape_log: Vec::new(),
            tape_position: 0,
            paused: false,
            menu_traps: 0,
            resets: 0,
            sound_resumes: 0,
            cart_log: Vec::new(),
            autostarts: Vec::new(),
            snapshots_read: Vec::new(),
            media: HashMap::new(),
            directories: HashMap::new(),
            ram: vec![0; RAM_SIZE],
        }
    }

    /// Register the directory of a disk image as raw file name bytes.
    pub fn insert_disk_directory(&mut self, image: impl Into<PathBuf>, entries: Vec<Vec<u8>>) {
        self.directories.insert(image.into(), entries);
    }

    pub fn attached(&self, peripheral: Peripheral) -> Option<&Path> {
        self.media.get(&peripheral).map(PathBuf::as_path)
    }
}

impl Default for HeadlessMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for HeadlessMachine {
    fn machine_name(&self) -> &str {
        &self.name
    }

    fn resource(&self, resource: Resource) -> Result<i32, MachineError> {
        self.resources
            .get(&resource)
            .copied()
            .ok_or(MachineError::Resource(resource))
    }

    fn set_resource(&mut self, resource: Resource, value: i32) -> Result<(), MachineError> {
        let slot = self
            .resources
            .get_mut(&resource)
            .ok_or(MachineError::Resource(resource))?;
        *slot = value;
        Ok(())
    }

    fn feed_keyboard(&mut self, text: &str) {
        self.keyboard_buffer.push_str(text);
    }

    fn set_key(&mut self, row: i8, column: u8, pressed: bool) {
        if pressed {
            self.pressed_keys.insert((row, column));
        } else {
            self.pressed_keys.remove(&(row, column));
        }
    }

    fn clear_key_matrix(&mut self) {
        self.pressed_keys.clear();
    }

    fn set_joystick(&mut self, port: u8, pins: JoyPins, pressed: bool) {
        let Some(state) = self.joysticks.get_mut(usize::from(port).wrapping_sub(1)) else {
            return;
        };
        state.set(pins, pressed);
    }

    fn datasette_control(&mut self, control: TapeControl) {
        if matches!(control, TapeControl::Reset | TapeControl::Rewind) {
            self.tape_position = 0;
        }
        self.tape_log.push(control);
    }

    fn tape_attached(&self) -> bool {
        self.media.contains_key(&Peripheral::Datasette)
    }

    fn tape_seek(&mut self, index: usize) -> Result<(), MachineError> {
        if !self.tape_attached() {
            return Err(MachineError::TapeSeek(index));
        }
        self.tape_position = index;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn show_menu(&mut self) {
        self.menu_traps += 1;
    }

    fn disk_file_name(&self, image: &Path, index: usize) -> Option<Vec<u8>> {
        let entries = self.directories.get(image)?;
        index.checked_sub(1).and_then(|i| entries.get(i)).cloned()
    }

    fn autostart(&mut self, image: &Path, index: usize) -> Result<(), MachineError> {
        self.autostarts.push((image.to_path_buf(), index));
        Ok(())
    }

    fn read_snapshot(&mut self, path: &Path) -> Result<(), MachineError> {
        let mut snapshot = Snapshot::open(path, Some(self.name.as_str()))?;
        let mut module = snapshot.module_open("C64MEM")?;
        let mut ram = vec![0u8; RAM_SIZE];
        module.read_byte_array(&mut ram)?;
        self.ram = ram;
        // Reading a snapshot drops the cartridge, as the real core does.
        self.media.remove(&Peripheral::Cartridge);
        self.snapshots_read.push(path.to_path_buf());
        Ok(())
    }

    fn write_snapshot(&mut self, path: &Path) -> Result<(), MachineError> {
        let mut writer = SnapshotWriter::create(path, &self.name)?;
        writer.write_module("MAINCPU", 1, 1, &[0; 8])?;
        writer.write_module("C64MEM", 0, 4, &self.ram)?;
        writer.finish()?;
        Ok(())
    }

    fn attach_image(
        &mut self,
        peripheral: Peripheral,
        image: &Path,
    ) -> Result<Vec<String>, MachineError> {
        if image.as_os_str().is_empty() {
            return Err(MachineError::Attach {
                peripheral,
                path: image.to_path_buf(),
            });
        }
        self.media.insert(peripheral, image.to_path_buf());
        let listing = match peripheral {
            Peripheral::Drive8 => self
                .directories
                .get(image)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|name| format!("\"{}\" PRG", String::from_utf8_lossy(name)))
                        .collect()
                })
                .unwrap_or_default(),
            Peripheral::Datasette | Peripheral::Cartridge => Vec::new(),
        };
        debug!("attached {peripheral:?}: {}", image.display());
        Ok(listing)
    }

    fn detach_image(&mut self, peripheral: Peripheral) {
        self.media.remove(&peripheral);
    }

    fn cartridge_file(&self) -> Option<PathBuf> {
        self.media.get(&Peripheral::Cartridge).cloned()
    }

    fn cart_control(&mut self, control: CartControl) {
        self.cart_log.push(control);
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.keyboard_buffer.clear();
        self.pressed_keys.clear();
    }

    fn resume_sound(&mut self) {
        self.sound_resumes += 1;
    }
}

/// A call the controller made into the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Redraw,
    Paused(bool),
    MenuActivated,
    KeyboardToggled,
    SettingChanged {
        setting: Setting,
        value: String,
        source: String,
        values: Vec<String>,
    },
}

#[derive(Debug, Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
    /// Answer given to [`View::pending_redraw`].
    pub wants_redraw: bool,
}

impl RecordingView {
    pub fn redraws(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ViewEvent::Redraw))
            .count()
    }
}

impl View for RecordingView {
    fn update_view(&mut self) {
        self.events.push(ViewEvent::Redraw);
    }

    fn display_paused(&mut self, paused: bool) {
        self.events.push(ViewEvent::Paused(paused));
    }

    fn activate_menu(&mut self) {
        self.events.push(ViewEvent::MenuActivated);
    }

    fn toggle_keyboard(&mut self) {
        self.events.push(ViewEvent::KeyboardToggled);
    }

    fn pending_redraw(&self) -> bool {
        self.wants_redraw
    }

    fn on_setting_changed(
        &mut self,
        setting: Setting,
        value: &str,
        source: &str,
        values: &[String],
    ) {
        self.events.push(ViewEvent::SettingChanged {
            setting,
            value: value.to_string(),
            source: source.to_string(),
            values: values.to_vec(),
        });
    }
}
