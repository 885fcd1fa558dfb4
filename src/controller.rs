//! Emulator controller
//!
//! The controller sits between the view and the emulator core. It owns both
//! collaborators and the [`ActionScheduler`], turns device input into
//! emulator actions once per frame, and offers the media operations the menu
//! needs (loading programs, snapshots and snapshot patches, attaching images).

use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::action::ActionKind;
use crate::config::ControllerConfig;
use crate::core::{
    CartControl, Machine, MachineError, Peripheral, Resource, Setting, TapeControl, View,
};
use crate::input::{ControlPadMap, InputEvent, SpecialCommand};
use crate::patch::{self, PatchError, PatchInfo, PatchModule};
use crate::scheduler::ActionScheduler;

/// Volume restored when leaving a muted pause/menu state.
const FULL_VOLUME: i32 = 100;

/// Disk directories pad file names with shifted spaces.
const NAME_PADDING: u8 = 0xA0;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("no tape image attached")]
    NoTape,
}

/// How [`Controller::load_file`] should start a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Let the emulator's autostart work out the medium.
    AutoDetect,
    Cartridge,
    /// Type the load command for a file on the attached disk.
    Disk,
    /// Type the load command and press play on the datasette.
    Tape,
}

/// Main controller state
pub struct Controller<M: Machine, V: View> {
    machine: M,
    view: V,
    scheduler: ActionScheduler,
    config: ControllerConfig,
    joystick_port: u8,
    boot_pending: bool,
    frame_drawn: bool,
}

impl<M: Machine, V: View> Controller<M, V> {
    pub fn new(machine: M, view: V, config: ControllerConfig) -> Self {
        Self {
            machine,
            view,
            scheduler: ActionScheduler::new(config.delays),
            joystick_port: config.joystick_port,
            boot_pending: config.show_menu_on_boot,
            frame_drawn: false,
            config,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn scheduler(&self) -> &ActionScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Control port the device joystick currently drives.
    pub fn joystick_port(&self) -> u8 {
        self.joystick_port
    }

    /// Arm a deferred action on behalf of the view.
    pub fn request_action(&mut self, kind: ActionKind) -> bool {
        self.scheduler.request_action(kind, &mut self.machine)
    }

    /// The emulator finished drawing a frame into the view.
    pub fn notify_frame_drawn(&mut self) {
        self.view.update_view();
        self.frame_drawn = true;
    }

    /// Per-frame input scan, called by the emulator after every frame.
    ///
    /// Applies the input maps, advances the deferred actions by one frame,
    /// and redraws the view if it asked for it and the emulator didn't draw
    /// this frame.
    pub fn scan_controls(&mut self, maps: &[ControlPadMap]) {
        if self.boot_pending {
            self.boot_pending = false;
            self.machine.show_menu();
            return;
        }

        for event in maps.iter().filter_map(ControlPadMap::decode) {
            match event {
                InputEvent::Joystick { pins, pressed } => {
                    self.machine.set_joystick(self.joystick_port, pins, pressed);
                }
                InputEvent::Key { position, pressed } => {
                    self.machine.set_key(position.row, position.column, pressed);
                }
                InputEvent::Command(command) => self.run_command(command),
            }
        }

        self.scheduler.tick(&mut self.machine, &mut self.view);

        if !self.frame_drawn && self.view.pending_redraw() {
            self.view.update_view();
        }
        self.frame_drawn = false;
    }

    fn run_command(&mut self, command: SpecialCommand) {
        match command {
            SpecialCommand::ShowMenu => {
                if self.machine.is_paused() {
                    // Already silent, no need to wait for the buffer to drain.
                    self.view.activate_menu();
                    self.set_volume(FULL_VOLUME);
                } else {
                    self.request_action(ActionKind::ShowMenu);
                }
            }
            SpecialCommand::ToggleKeyboard => {
                self.view.toggle_keyboard();
                self.machine.clear_key_matrix();
                self.view.update_view();
            }
            SpecialCommand::Pause => {
                if self.machine.is_paused() {
                    self.machine.set_paused(false);
                    self.view.display_paused(false);
                    self.view.update_view();
                    self.set_volume(FULL_VOLUME);
                } else {
                    self.request_action(ActionKind::Pause);
                }
            }
            SpecialCommand::SwapJoysticks => self.swap_joysticks(),
            SpecialCommand::ToggleWarp => self.toggle_warp(),
        }
    }

    fn swap_joysticks(&mut self) {
        let (port, port1_device, port2_device) = if self.joystick_port == 1 {
            (2, 0, 1)
        } else {
            (1, 1, 0)
        };
        self.joystick_port = port;
        self.set_resource(Resource::JoyPort1Device, port1_device);
        self.set_resource(Resource::JoyPort2Device, port2_device);
        self.view
            .on_setting_changed(Setting::JoystickPort, &format!("Port {port}"), "", &[]);
    }

    fn toggle_warp(&mut self) {
        match self.machine.resource(Resource::WarpMode) {
            Ok(value) => self.set_resource(Resource::WarpMode, i32::from(value == 0)),
            Err(err) => warn!("cannot toggle warp mode: {err}"),
        }
    }

    fn set_volume(&mut self, volume: i32) {
        self.set_resource(Resource::SoundVolume, volume);
    }

    fn set_resource(&mut self, resource: Resource, value: i32) {
        if let Err(err) = self.machine.set_resource(resource, value) {
            warn!("cannot set {resource:?} to {value}: {err}");
        }
    }

    /// Start a program from `file`. `index` selects the directory entry
    /// (disk), the file on tape, or the autostart entry; 0 means the first.
    pub fn load_file(
        &mut self,
        kind: LoadKind,
        file: &Path,
        index: usize,
    ) -> Result<(), ControllerError> {
        info!("loading {} ({kind:?}, entry {index})", file.display());
        match kind {
            LoadKind::AutoDetect | LoadKind::Cartridge => self.autostart(kind, file, index),
            LoadKind::Disk => {
                // A load still running in warp would swallow the sound.
                self.set_resource(Resource::WarpMode, 0);
                let name = self
                    .machine
                    .disk_file_name(file, index)
                    .map(|raw| program_name(&raw))
                    .unwrap_or_default();
                self.scheduler.set_program_name(&name);
                self.request_action(ActionKind::LoadDisk);
                Ok(())
            }
            LoadKind::Tape => {
                if !self.machine.tape_attached() {
                    return Err(ControllerError::NoTape);
                }
                if index > 0 {
                    self.machine.tape_seek(index)?;
                }
                self.request_action(ActionKind::LoadTape);
                Ok(())
            }
        }
    }

    fn autostart(
        &mut self,
        kind: LoadKind,
        file: &Path,
        index: usize,
    ) -> Result<(), ControllerError> {
        // An attached cartridge would start instead of the new program.
        self.machine.detach_image(Peripheral::Cartridge);
        // Some tapes won't start without a datasette reset.
        self.machine.datasette_control(TapeControl::Reset);
        self.set_resource(Resource::WarpMode, 0);

        if self.machine.is_paused() {
            self.machine.set_paused(false);
            self.view.display_paused(false);
        }

        // Cartridges only start with cartridge reset enabled.
        let restore_reset = if kind == LoadKind::Cartridge {
            match self.machine.resource(Resource::CartridgeReset)? {
                0 => {
                    self.machine.set_resource(Resource::CartridgeReset, 1)?;
                    true
                }
                _ => false,
            }
        } else {
            false
        };

        let result = self.machine.autostart(file, index);

        if restore_reset {
            self.set_resource(Resource::CartridgeReset, 0);
        }
        result.map_err(ControllerError::from)
    }

    /// Restore a snapshot, keeping the currently attached cartridge.
    pub fn load_state(&mut self, file: &Path) -> Result<(), ControllerError> {
        self.set_resource(Resource::WarpMode, 0);

        let cartridge = self.machine.cartridge_file();
        let result = self.machine.read_snapshot(file);

        // Reading a snapshot detaches the cartridge. Put it back without
        // letting the attach reset the CPU.
        if let Some(cartridge) = cartridge {
            let reset = self.machine.resource(Resource::CartridgeReset)?;
            self.machine.set_resource(Resource::CartridgeReset, 0)?;
            let attached = self.machine.attach_image(Peripheral::Cartridge, &cartridge);
            self.machine.set_resource(Resource::CartridgeReset, reset)?;
            attached?;
        }

        result?;
        info!("loaded snapshot {}", file.display());
        Ok(())
    }

    pub fn save_state(&mut self, file: &Path) -> Result<(), ControllerError> {
        self.machine.write_snapshot(file)?;
        info!("saved snapshot {}", file.display());
        Ok(())
    }

    /// Append a patch module to a saved snapshot.
    pub fn patch_save_state(
        &self,
        snapshot: &Path,
        module: &PatchModule,
    ) -> Result<(), ControllerError> {
        module.append_to(snapshot)?;
        Ok(())
    }

    /// Read a patch module's payload into `buf`. Snapshots taken on another
    /// machine are refused.
    pub fn save_state_patch(
        &self,
        snapshot: &Path,
        name: &str,
        buf: &mut [u8],
    ) -> Result<PatchInfo, ControllerError> {
        let machine = Some(self.machine.machine_name());
        Ok(patch::read(snapshot, machine, name, buf)?)
    }

    /// Version and payload size of a patch module, for sizing the buffer
    /// handed to [`save_state_patch`](Self::save_state_patch).
    pub fn save_state_patch_info(
        &self,
        snapshot: &Path,
        name: &str,
    ) -> Result<PatchInfo, ControllerError> {
        let machine = Some(self.machine.machine_name());
        Ok(patch::read_info(snapshot, machine, name)?)
    }

    /// Attach an image and tell the view what is now in the slot.
    pub fn attach_image(
        &mut self,
        peripheral: Peripheral,
        image: &Path,
    ) -> Result<(), ControllerError> {
        let listing = self.machine.attach_image(peripheral, image)?;
        let value = match listing.first() {
            Some(first) => first.clone(),
            None => image
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        self.view.on_setting_changed(
            peripheral.into(),
            &value,
            &image.to_string_lossy(),
            &listing,
        );
        Ok(())
    }

    pub fn detach_image(&mut self, peripheral: Peripheral) {
        self.machine.detach_image(peripheral);
        self.view
            .on_setting_changed(peripheral.into(), "Empty", "", &[]);
    }

    pub fn set_tape_control(&mut self, control: TapeControl) {
        self.machine.datasette_control(control);
    }

    pub fn set_cart_control(&mut self, control: CartControl) {
        if control == CartControl::Freeze {
            // Keys held while the freezer menu comes up would stay stuck.
            self.machine.clear_key_matrix();
        }
        self.machine.cart_control(control);
    }

    /// Reset the machine. Pending typed commands would land in the fresh
    /// BASIC prompt, so they are dropped too.
    pub fn reset_computer(&mut self) {
        self.scheduler.reset();
        self.machine.reset();
    }

    pub fn resume_sound(&mut self) {
        self.machine.resume_sound();
    }
}

/// Program name from a raw directory entry, cut at the first padding byte.
fn program_name(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .position(|&b| b == NAME_PADDING)
        .unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
