// Copyright (C) 2025 Dayton Fishell
// c64ctl Emulator Controller
// This file is part of c64ctl.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Emulator snapshot container
//!
//! A snapshot file is a header followed by a flat list of named modules:
//!
//! ```text
//! header:  "VICE Snapshot File\x1a"  major(1) minor(1)  machine(16)
//!          ["VICE Version\x1a"  version(4)  revision(4 LE)]   optional
//! module:  name(16)  major(1)  minor(1)  size(4 LE, includes header)  data
//! ```
//!
//! Modules are found by walking the list from the first module and skipping
//! over each one by its size field, so anything appended to the end of the
//! file in module shape is found the same way as the emulator's own modules.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

pub const SNAPSHOT_MAGIC: &[u8; 19] = b"VICE Snapshot File\x1a";
pub const VERSION_MAGIC: &[u8; 13] = b"VICE Version\x1a";

pub const SNAPSHOT_MAJOR: u8 = 2;
pub const SNAPSHOT_MINOR: u8 = 0;

pub const MACHINE_NAME_LEN: usize = 16;
pub const MODULE_NAME_LEN: usize = 16;
/// name + major + minor + size
pub const MODULE_HEADER_LEN: usize = MODULE_NAME_LEN + 1 + 1 + 4;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a snapshot file")]
    BadMagic,
    #[error("snapshot was taken on {found:?}, expected {expected:?}")]
    MachineMismatch { expected: String, found: String },
    #[error("module {0:?} not found")]
    ModuleNotFound(String),
    #[error("module header at offset {offset} declares impossible size {size}")]
    BadModuleSize { offset: u64, size: u32 },
    #[error("read past the end of module {0:?}")]
    OutOfBounds(String),
    #[error("module {name:?} too large: {len} bytes")]
    ModuleTooLarge { name: String, len: usize },
}

/// Pack a name into a fixed, null padded field. Longer names are truncated.
pub fn pack_name<const N: usize>(name: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = name.as_bytes();
    let len = bytes.len().min(N);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

fn unpack_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Emulator version recorded by newer snapshot writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorVersion {
    pub version: [u8; 4],
    pub revision: u32,
}

/// Header of one module as found while walking the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    pub name: String,
    pub major: u8,
    pub minor: u8,
    /// Total size including the header.
    pub size: u32,
    /// File offset of the module header.
    pub offset: u64,
}

impl ModuleHeader {
    pub fn data_len(&self) -> u64 {
        u64::from(self.size) - MODULE_HEADER_LEN as u64
    }
}

/// A snapshot opened for reading.
#[derive(Debug)]
pub struct Snapshot<R> {
    reader: R,
    major: u8,
    minor: u8,
    machine: String,
    version: Option<EmulatorVersion>,
    first_module: u64,
}

impl Snapshot<BufReader<File>> {
    /// Open a snapshot file. When `machine` is given, the snapshot must have
    /// been taken on that machine.
    pub fn open(path: impl AsRef<Path>, machine: Option<&str>) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), machine)
    }
}

impl<R: Read + Seek> Snapshot<R> {
    pub fn from_reader(mut reader: R, machine: Option<&str>) -> Result<Self, SnapshotError> {
        let mut magic = [0u8; SNAPSHOT_MAGIC.len()];
        read_exact_or(&mut reader, &mut magic, SnapshotError::BadMagic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        let mut head = [0u8; 2 + MACHINE_NAME_LEN];
        read_exact_or(&mut reader, &mut head, SnapshotError::BadMagic)?;
        let (major, minor) = (head[0], head[1]);
        let found = unpack_name(&head[2..]);
        if let Some(expected) = machine {
            if found != expected {
                return Err(SnapshotError::MachineMismatch {
                    expected: expected.to_string(),
                    found,
                });
            }
        }

        // Older writers go straight to the first module.
        let after_name = reader.stream_position()?;
        let mut block = [0u8; VERSION_MAGIC.len() + 8];
        let version = match reader.read_exact(&mut block) {
            Ok(()) if &block[..VERSION_MAGIC.len()] == VERSION_MAGIC => {
                let tail = &block[VERSION_MAGIC.len()..];
                Some(EmulatorVersion {
                    version: [tail[0], tail[1], tail[2], tail[3]],
                    revision: u32::from_le_bytes([tail[4], tail[5], tail[6], tail[7]]),
                })
            }
            Ok(()) => None,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => return Err(e.into()),
        };
        let first_module = match version {
            Some(_) => reader.stream_position()?,
            None => reader.seek(SeekFrom::Start(after_name))?,
        };

        Ok(Self {
            reader,
            major,
            minor,
            machine: found,
            version,
            first_module,
        })
    }

    pub fn version(&self) -> (u8, u8) {
        (self.major, self.minor)
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn emulator_version(&self) -> Option<EmulatorVersion> {
        self.version
    }

    /// Read the module header at the reader's position. `None` at the end of
    /// the module list.
    fn next_header(&mut self) -> Result<Option<ModuleHeader>, SnapshotError> {
        let offset = self.reader.stream_position()?;
        let mut raw = [0u8; MODULE_HEADER_LEN];
        match self.reader.read_exact(&mut raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let size = u32::from_le_bytes([raw[18], raw[19], raw[20], raw[21]]);
        if (size as usize) < MODULE_HEADER_LEN {
            return Err(SnapshotError::BadModuleSize { offset, size });
        }
        Ok(Some(ModuleHeader {
            name: unpack_name(&raw[..MODULE_NAME_LEN]),
            major: raw[16],
            minor: raw[17],
            size,
            offset,
        }))
    }

    fn skip_data(&mut self, header: &ModuleHeader) -> Result<(), SnapshotError> {
        self.reader.seek(SeekFrom::Current(header.data_len() as i64))?;
        Ok(())
    }

    /// List every module in file order.
    pub fn modules(&mut self) -> Result<Vec<ModuleHeader>, SnapshotError> {
        self.reader.seek(SeekFrom::Start(self.first_module))?;
        let mut modules = Vec::new();
        while let Some(header) = self.next_header()? {
            self.skip_data(&header)?;
            modules.push(header);
        }
        Ok(modules)
    }

    /// Find a module by name and position the reader at its data.
    ///
    /// Names compare over the full 16-byte field, so a name longer than the
    /// field matches the truncated name it was written under.
    pub fn module_open(&mut self, name: &str) -> Result<SnapshotModule<'_, R>, SnapshotError> {
        let wanted = unpack_name(&pack_name::<MODULE_NAME_LEN>(name));
        self.reader.seek(SeekFrom::Start(self.first_module))?;
        while let Some(header) = self.next_header()? {
            if header.name == wanted {
                return Ok(SnapshotModule {
                    reader: &mut self.reader,
                    len: header.data_len(),
                    pos: 0,
                    header,
                });
            }
            self.skip_data(&header)?;
        }
        Err(SnapshotError::ModuleNotFound(name.to_string()))
    }
}

/// Bounds-checked reader over the data of one module.
#[derive(Debug)]
pub struct SnapshotModule<'a, R> {
    reader: &'a mut R,
    header: ModuleHeader,
    len: u64,
    pos: u64,
}

impl<R: Read> SnapshotModule<'_, R> {
    pub fn header(&self) -> &ModuleHeader {
        &self.header
    }

    pub fn major(&self) -> u8 {
        self.header.major
    }

    pub fn minor(&self) -> u8 {
        self.header.minor
    }

    /// Data bytes not read yet.
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }

    fn take(&mut self, buf: &mut [u8]) -> Result<(), SnapshotError> {
        if buf.len() as u64 > self.remaining() {
            return Err(SnapshotError::OutOfBounds(self.header.name.clone()));
        }
        self.reader.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, SnapshotError> {
        let mut b = [0u8; 1];
        self.take(&mut b)?;
        Ok(b[0])
    }

    pub fn read_dword(&mut self) -> Result<u32, SnapshotError> {
        let mut b = [0u8; 4];
        self.take(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_byte_array(&mut self, buf: &mut [u8]) -> Result<(), SnapshotError> {
        self.take(buf)
    }
}

/// Writes a complete snapshot: header, version block and modules.
///
/// This is the emulator side of the format, used by the headless machine.
/// Patch modules are never written through here, they are appended raw.
pub struct SnapshotWriter<W: Write> {
    writer: W,
}

impl SnapshotWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, machine: &str) -> Result<Self, SnapshotError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), machine)
    }
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(mut writer: W, machine: &str) -> Result<Self, SnapshotError> {
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&[SNAPSHOT_MAJOR, SNAPSHOT_MINOR])?;
        writer.write_all(&pack_name::<MACHINE_NAME_LEN>(machine))?;
        writer.write_all(VERSION_MAGIC)?;
        let (major, minor, patch) = crate_version();
        writer.write_all(&[major, minor, patch, 0])?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self { writer })
    }

    pub fn write_module(
        &mut self,
        name: &str,
        major: u8,
        minor: u8,
        data: &[u8],
    ) -> Result<(), SnapshotError> {
        let size = u32::try_from(MODULE_HEADER_LEN + data.len()).map_err(|_| {
            SnapshotError::ModuleTooLarge {
                name: name.to_string(),
                len: data.len(),
            }
        })?;
        self.writer.write_all(&pack_name::<MODULE_NAME_LEN>(name))?;
        self.writer.write_all(&[major, minor])?;
        self.writer.write_all(&size.to_le_bytes())?;
        self.writer.write_all(data)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, SnapshotError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn crate_version() -> (u8, u8, u8) {
    let parse = |s: &str| s.parse::<u8>().unwrap_or(0);
    (
        parse(env!("CARGO_PKG_VERSION_MAJOR")),
        parse(env!("CARGO_PKG_VERSION_MINOR")),
        parse(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

fn read_exact_or<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    short: SnapshotError,
) -> Result<(), SnapshotError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(short),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        let mut writer = SnapshotWriter::new(Vec::new(), "C64SC").expect("header");
        writer.write_module("MAINCPU", 1, 1, &[1, 2, 3, 4]).unwrap();
        writer.write_module("C64MEM", 0, 4, &[0xEE; 32]).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn reads_header_fields() {
        let snap = Snapshot::from_reader(Cursor::new(sample()), Some("C64SC")).expect("open");
        assert_eq!(snap.version(), (SNAPSHOT_MAJOR, SNAPSHOT_MINOR));
        assert_eq!(snap.machine(), "C64SC");
        assert!(snap.emulator_version().is_some());
    }

    #[test]
    fn lists_modules_in_order() {
        let mut snap = Snapshot::from_reader(Cursor::new(sample()), None).unwrap();
        let modules = snap.modules().unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["MAINCPU", "C64MEM"]);
        assert_eq!(modules[0].size, 26);
        assert_eq!(modules[1].data_len(), 32);
    }

    #[test]
    fn opens_later_module_and_reads_data() {
        let mut snap = Snapshot::from_reader(Cursor::new(sample()), None).unwrap();
        let mut module = snap.module_open("C64MEM").unwrap();
        assert_eq!((module.major(), module.minor()), (0, 4));
        assert_eq!(module.header().name, "C64MEM");
        assert_eq!(module.header().data_len(), 32);
        assert_eq!(module.read_byte().unwrap(), 0xEE);
        assert_eq!(module.remaining(), 31);
    }

    #[test]
    fn reads_are_bounded_by_module() {
        let mut snap = Snapshot::from_reader(Cursor::new(sample()), None).unwrap();
        let mut module = snap.module_open("MAINCPU").unwrap();
        assert_eq!(module.read_dword().unwrap(), 0x0403_0201);
        assert!(matches!(
            module.read_byte(),
            Err(SnapshotError::OutOfBounds(name)) if name == "MAINCPU"
        ));
    }

    #[test]
    fn missing_module_is_reported() {
        let mut snap = Snapshot::from_reader(Cursor::new(sample()), None).unwrap();
        assert!(matches!(
            snap.module_open("NOPE"),
            Err(SnapshotError::ModuleNotFound(name)) if name == "NOPE"
        ));
    }

    #[test]
    fn machine_mismatch_is_rejected() {
        let result = Snapshot::from_reader(Cursor::new(sample()), Some("VIC20"));
        assert!(matches!(result, Err(SnapshotError::MachineMismatch { .. })));
    }

    #[test]
    fn rejects_foreign_files() {
        let result = Snapshot::from_reader(Cursor::new(b"C64S\x01\x00\x00\x00".to_vec()), None);
        assert!(matches!(result, Err(SnapshotError::BadMagic)));
    }

    #[test]
    fn accepts_snapshot_without_version_block() {
        let mut bytes = SNAPSHOT_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 1]);
        bytes.extend_from_slice(&pack_name::<MACHINE_NAME_LEN>("C64"));
        bytes.extend_from_slice(&pack_name::<MODULE_NAME_LEN>("CIA1"));
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&23u32.to_le_bytes());
        bytes.push(0x7F);

        let mut snap = Snapshot::from_reader(Cursor::new(bytes), Some("C64")).unwrap();
        assert!(snap.emulator_version().is_none());
        let mut module = snap.module_open("CIA1").unwrap();
        assert_eq!(module.read_byte().unwrap(), 0x7F);
    }

    #[test]
    fn undersized_module_header_is_an_error() {
        let mut bytes = sample();
        bytes.extend_from_slice(&pack_name::<MODULE_NAME_LEN>("BROKEN"));
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&4u32.to_le_bytes());
        let mut snap = Snapshot::from_reader(Cursor::new(bytes), None).unwrap();
        assert!(matches!(
            snap.module_open("ABSENT"),
            Err(SnapshotError::BadModuleSize { size: 4, .. })
        ));
    }

    #[test]
    fn long_names_are_truncated() {
        let field = pack_name::<MODULE_NAME_LEN>("ABCDEFGHIJKLMNOPQRS");
        assert_eq!(&field, b"ABCDEFGHIJKLMNOP");
        assert_eq!(unpack_name(&field), "ABCDEFGHIJKLMNOP");
    }
}
