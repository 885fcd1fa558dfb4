// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! c64ctl emulator controller
//!
//! This library sits between a handheld's UI layer and an embedded C64
//! emulator core: it schedules deferred UI actions against the emulator's
//! frame cycle and appends auxiliary data modules to emulator snapshots.

pub mod action;
pub mod config;
pub mod controller;
pub mod core;
pub mod headless;
pub mod input;
pub mod patch;
pub mod scheduler;
pub mod snapshot;

// Re-export commonly used types
pub use action::ActionKind;
pub use config::{ActionDelays, ControllerConfig};
pub use controller::{Controller, ControllerError, LoadKind};
pub use core::{Machine, View};
pub use patch::{PatchError, PatchInfo, PatchModule};
pub use scheduler::ActionScheduler;
pub use snapshot::{Snapshot, SnapshotError};
