// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// A simple demo of the controller driving a headless machine.
use std::path::Path;

use anyhow::Context;
use c64ctl_core::headless::{HeadlessMachine, RecordingView};
use c64ctl_core::{ActionKind, Controller, ControllerConfig, LoadKind, Machine, PatchModule, patch};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("c64ctl v{}", env!("CARGO_PKG_VERSION"));
    println!("============");
    println!();

    let disk = Path::new("demo.d64");
    let mut machine = HeadlessMachine::new();
    machine.insert_disk_directory(disk, vec![b"HELLO WORLD\xA0\xA0\xA0\xA0\xA0".to_vec()]);

    let mut controller =
        Controller::new(machine, RecordingView::default(), ControllerConfig::default());

    // The first scan after boot only brings up the menu.
    controller.scan_controls(&[]);
    println!("Boot menu traps: {}", controller.machine().menu_traps);

    println!(
        "Loading entry 1 of {} (typed after {} frames)...",
        disk.display(),
        controller.config().delays.frames(ActionKind::LoadDisk)
    );
    controller.load_file(LoadKind::Disk, disk, 1)?;

    let mut frame = 0;
    while controller.scheduler().is_busy() {
        controller.scan_controls(&[]);
        frame += 1;
    }
    println!("  Settled after {frame} frames");
    println!(
        "  Keyboard buffer: {:?}",
        controller.machine().keyboard_buffer
    );
    println!();

    let snapshot = std::env::temp_dir().join("c64ctl-demo.vsf");
    controller
        .save_state(&snapshot)
        .with_context(|| format!("saving {}", snapshot.display()))?;

    let module = PatchModule::new("PSVDEMO", 1, 0, b"launcher state".to_vec());
    controller.patch_save_state(&snapshot, &module)?;

    let info = controller.save_state_patch_info(&snapshot, &module.name)?;
    let mut payload = vec![0u8; info.data_size as usize];
    controller.save_state_patch(&snapshot, &module.name, &mut payload)?;

    let machine_name = controller.machine().machine_name();
    println!("Snapshot {}:", snapshot.display());
    let mut container = c64ctl_core::Snapshot::open(&snapshot, Some(machine_name))?;
    for header in container.modules()? {
        println!(
            "  {:<16} v{}.{}  {:>6} bytes",
            header.name,
            header.major,
            header.minor,
            header.size
        );
    }
    println!();

    let missing = patch::read_module(&snapshot, Some(machine_name), "MISSING");
    if payload == module.data && missing.is_err() {
        println!("✓ Patch module read back intact");
    } else {
        println!("✗ Patch module did not read back as written");
    }

    std::fs::remove_file(&snapshot).ok();
    Ok(())
}
