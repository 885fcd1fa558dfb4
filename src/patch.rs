// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Snapshot patch modules
//!
//! The emulator's snapshot writer cannot be asked to include extra data, so
//! auxiliary data is appended to a finished snapshot as one more module:
//!
//! ```text
//! offset  size  field
//!      0    16  name, null padded / truncated
//!     16     1  major version
//!     17     1  minor version
//!     18     4  module size, LE (26 + payload length)
//!     22     4  payload size, LE
//!     26     n  payload
//! ```
//!
//! Writing is a raw append at the end of the file. Reading goes through the
//! snapshot container's module lookup, which walks the module list and finds
//! the appended record like any other module.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::snapshot::{
    MODULE_HEADER_LEN, MODULE_NAME_LEN, Snapshot, SnapshotError, SnapshotModule, pack_name,
};

/// Module header plus the payload size field.
pub const PATCH_HEADER_LEN: usize = MODULE_HEADER_LEN + 4;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("cannot open snapshot {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("payload of {0} bytes does not fit a module")]
    TooLarge(usize),
    #[error("module {0:?} not found in snapshot")]
    ModuleNotFound(String),
    #[error("cannot read payload size of module {0:?}")]
    SizeField(String),
    #[error("payload of {needed} bytes does not fit a buffer of {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error(transparent)]
    Snapshot(SnapshotError),
}

impl PatchError {
    /// Negative status code for callers on the far side of the adapter.
    pub fn code(&self) -> i32 {
        match self {
            PatchError::Open { .. } => -1,
            PatchError::ShortWrite { .. } | PatchError::Write(_) => -2,
            PatchError::TooLarge(_) => -3,
            PatchError::ModuleNotFound(_) => -4,
            PatchError::SizeField(_) => -5,
            PatchError::BufferTooSmall { .. } => -6,
            PatchError::Snapshot(_) => -7,
        }
    }

    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, PatchError::ModuleNotFound(_))
    }
}

/// Version and payload size of a patch module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchInfo {
    pub major: u8,
    pub minor: u8,
    pub data_size: u32,
}

/// A patch module with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchModule {
    pub name: String,
    pub major: u8,
    pub minor: u8,
    pub data: Vec<u8>,
}

impl PatchModule {
    pub fn new(name: impl Into<String>, major: u8, minor: u8, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            major,
            minor,
            data,
        }
    }

    pub fn info(&self) -> PatchInfo {
        PatchInfo {
            major: self.major,
            minor: self.minor,
            data_size: self.data.len() as u32,
        }
    }

    /// Append this module to the snapshot at `target`.
    pub fn append_to(&self, target: impl AsRef<Path>) -> Result<(), PatchError> {
        write(target, &self.name, self.major, self.minor, &self.data)
    }
}

/// Serialize one patch record.
pub fn encode(name: &str, major: u8, minor: u8, payload: &[u8]) -> Result<Vec<u8>, PatchError> {
    let module_size = PATCH_HEADER_LEN + payload.len();
    let size_field = u32::try_from(module_size).map_err(|_| PatchError::TooLarge(payload.len()))?;

    let mut record = Vec::with_capacity(module_size);
    record.extend_from_slice(&pack_name::<MODULE_NAME_LEN>(name));
    record.push(major);
    record.push(minor);
    record.extend_from_slice(&size_field.to_le_bytes());
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(payload);
    Ok(record)
}

/// Append a patch module to an existing snapshot file.
///
/// The record goes out in a single write; a partial write is reported and
/// left in place.
pub fn write(
    target: impl AsRef<Path>,
    name: &str,
    major: u8,
    minor: u8,
    payload: &[u8],
) -> Result<(), PatchError> {
    let target = target.as_ref();
    let record = encode(name, major, minor, payload)?;

    let mut file = OpenOptions::new()
        .append(true)
        .open(target)
        .map_err(|source| PatchError::Open {
            path: target.to_path_buf(),
            source,
        })?;

    let written = file.write(&record).map_err(PatchError::Write)?;
    if written < record.len() {
        return Err(PatchError::ShortWrite {
            written,
            expected: record.len(),
        });
    }
    file.flush().map_err(PatchError::Write)?;

    info!(
        "appended patch module {name:?} v{major}.{minor} ({} bytes) to {}",
        payload.len(),
        target.display()
    );
    Ok(())
}

fn lookup_error(err: SnapshotError) -> PatchError {
    match err {
        SnapshotError::ModuleNotFound(name) => PatchError::ModuleNotFound(name),
        other => PatchError::Snapshot(other),
    }
}

/// Read the payload size field and check it against what the module holds.
fn payload_info<R: Read>(
    module: &mut SnapshotModule<'_, R>,
    name: &str,
) -> Result<PatchInfo, PatchError> {
    let data_size = module
        .read_dword()
        .map_err(|_| PatchError::SizeField(name.to_string()))?;
    if u64::from(data_size) > module.remaining() {
        return Err(PatchError::SizeField(name.to_string()));
    }
    Ok(PatchInfo {
        major: module.major(),
        minor: module.minor(),
        data_size,
    })
}

/// Read a patch module's payload into `buf`.
///
/// When `machine` is given, snapshots taken on another machine are refused.
/// `buf` must hold at least the payload size reported by [`read_info`]; only
/// the first `data_size` bytes are written.
pub fn read(
    snapshot: impl AsRef<Path>,
    machine: Option<&str>,
    name: &str,
    buf: &mut [u8],
) -> Result<PatchInfo, PatchError> {
    let mut snap = Snapshot::open(snapshot, machine).map_err(PatchError::Snapshot)?;
    let mut module = snap.module_open(name).map_err(lookup_error)?;
    let info = payload_info(&mut module, name)?;

    let needed = info.data_size as usize;
    let available = buf.len();
    let dest = buf
        .get_mut(..needed)
        .ok_or(PatchError::BufferTooSmall { needed, available })?;
    module.read_byte_array(dest).map_err(PatchError::Snapshot)?;

    debug!(
        "read patch module {name:?} v{}.{}, {} bytes",
        info.major, info.minor, info.data_size
    );
    Ok(info)
}

/// Resolve a patch module's version and payload size without reading the
/// payload.
pub fn read_info(
    snapshot: impl AsRef<Path>,
    machine: Option<&str>,
    name: &str,
) -> Result<PatchInfo, PatchError> {
    let mut snap = Snapshot::open(snapshot, machine).map_err(PatchError::Snapshot)?;
    let mut module = snap.module_open(name).map_err(lookup_error)?;
    payload_info(&mut module, name)
}

/// Read a whole patch module, sizing the payload buffer from its header.
pub fn read_module(
    snapshot: impl AsRef<Path>,
    machine: Option<&str>,
    name: &str,
) -> Result<PatchModule, PatchError> {
    let snapshot = snapshot.as_ref();
    let info = read_info(snapshot, machine, name)?;
    let mut data = vec![0u8; info.data_size as usize];
    let info = read(snapshot, machine, name, &mut data)?;
    data.truncate(info.data_size as usize);
    Ok(PatchModule::new(name, info.major, info.minor, data))
}
