#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use std::path::{Path, PathBuf};

pub const HEADER_SIZE: usize = 12;
pub const NAME_LEN: usize = 56;
pub const RECORD_SIZE: usize = 64;

/// Where the directory goes relative to the entry data.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Header, data, directory (what id's tools write)
    DirectoryLast,
    /// Header, directory, data
    DirectoryFirst,
}

/// Builds synthetic pak files for tests.
pub struct PakBuilder {
    files: Vec<(String, Vec<u8>)>,
    layout: Layout,
}

impl PakBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            layout: Layout::DirectoryLast,
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn file(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.to_string(), data.into()));
        self
    }

    /// Offset of the directory in the built file
    pub fn dir_offset(&self) -> usize {
        match self.layout {
            Layout::DirectoryFirst => HEADER_SIZE,
            Layout::DirectoryLast => HEADER_SIZE + self.data_len(),
        }
    }

    fn data_len(&self) -> usize {
        self.files.iter().map(|(_, d)| d.len()).sum()
    }

    fn data_start(&self) -> usize {
        match self.layout {
            Layout::DirectoryFirst => HEADER_SIZE + self.files.len() * RECORD_SIZE,
            Layout::DirectoryLast => HEADER_SIZE,
        }
    }

    fn directory(&self) -> Vec<u8> {
        let mut dir = Vec::new();
        let mut offset = self.data_start() as u32;
        for (name, data) in &self.files {
            let mut field = [0u8; NAME_LEN];
            field[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend_from_slice(&field);
            dir.write_u32::<LittleEndian>(offset).unwrap();
            dir.write_u32::<LittleEndian>(data.len() as u32).unwrap();
            offset += data.len() as u32;
        }
        dir
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"PACK");
        buffer
            .write_u32::<LittleEndian>(self.dir_offset() as u32)
            .unwrap();
        buffer
            .write_u32::<LittleEndian>((self.files.len() * RECORD_SIZE) as u32)
            .unwrap();

        let data: Vec<u8> = self.files.iter().flat_map(|(_, d)| d.clone()).collect();
        match self.layout {
            Layout::DirectoryFirst => {
                buffer.extend_from_slice(&self.directory());
                buffer.extend_from_slice(&data);
            }
            Layout::DirectoryLast => {
                buffer.extend_from_slice(&data);
                buffer.extend_from_slice(&self.directory());
            }
        }
        buffer
    }

    /// Write the pak into `dir` and return its path
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Patch the offset field of directory record `index` in a built pak.
pub fn set_record_offset(pak: &mut [u8], dir_offset: usize, index: usize, offset: u32) {
    let at = dir_offset + index * RECORD_SIZE + NAME_LEN;
    pak[at..at + 4].copy_from_slice(&offset.to_le_bytes());
}

/// Patch the length field of directory record `index` in a built pak.
pub fn set_record_length(pak: &mut [u8], dir_offset: usize, index: usize, length: u32) {
    let at = dir_offset + index * RECORD_SIZE + NAME_LEN + 4;
    pak[at..at + 4].copy_from_slice(&length.to_le_bytes());
}

/// Deterministic filler bytes
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// The two small paks used across tests: `pak0` is the base, `pak1` overrides.
pub fn base_and_override() -> (PakBuilder, PakBuilder) {
    let pak0 = PakBuilder::new()
        .file("progs.dat", b"progs from pak0".to_vec())
        .file("gfx/palette.lmp", pattern(768, 1))
        .file("sound/misc/basekey.wav", pattern(300, 2))
        .file("maps/e1m1.bsp", pattern(2048, 3));
    let pak1 = PakBuilder::new()
        .file("maps/e1m1.bsp", pattern(1500, 9))
        .file("maps/e2m1.bsp", pattern(900, 4))
        .file("progs.dat", b"progs from pak1".to_vec());
    (pak0, pak1)
}
