#![allow(dead_code)]

use std::cell::Cell;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use unpack7_core::{
    ArchiveEngine, ArchiveHandle, BlockCache, DirStatus, EngineError, EntryDescriptor, Extracted,
    Filesystem, Status, StdFilesystem,
};

#[derive(Debug, Clone)]
pub struct StubEntry {
    pub name: Vec<u16>,
    pub is_directory: bool,
    pub block: Option<usize>,
    pub data: Vec<u8>,
    pub attributes: Option<u32>,
}

impl StubEntry {
    pub fn file(name: &str, block: usize, data: &[u8]) -> StubEntry {
        StubEntry {
            name: name.encode_utf16().collect(),
            is_directory: false,
            block: Some(block),
            data: data.to_vec(),
            attributes: None,
        }
    }

    pub fn empty_file(name: &str) -> StubEntry {
        StubEntry {
            block: None,
            ..Self::file(name, 0, b"")
        }
    }

    pub fn dir(name: &str) -> StubEntry {
        StubEntry {
            is_directory: true,
            block: None,
            ..Self::file(name, 0, b"")
        }
    }

    pub fn with_name_units(mut self, units: &[u16]) -> StubEntry {
        self.name = units.to_vec();
        self
    }

    pub fn with_attributes(mut self, attributes: u32) -> StubEntry {
        self.attributes = Some(attributes);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub opens: Rc<Cell<usize>>,
    pub closes: Rc<Cell<usize>>,
    pub decodes: Rc<Cell<usize>>,
}

/// An engine that serves a scripted entry list and counts what it is asked
/// to do. Entries sharing a block index form one solid block.
#[derive(Debug, Clone, Default)]
pub struct StubEngine {
    pub entries: Vec<StubEntry>,
    pub counters: Counters,
    pub fail_open: Option<Status>,
    pub fail_extract: Option<(usize, Status)>,
}

impl StubEngine {
    pub fn new(entries: Vec<StubEntry>) -> StubEngine {
        StubEngine {
            entries,
            ..Default::default()
        }
    }
}

pub struct StubHandle {
    entries: Vec<StubEntry>,
    counters: Counters,
    fail_extract: Option<(usize, Status)>,
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        self.counters.closes.set(self.counters.closes.get() + 1);
    }
}

impl ArchiveEngine for StubEngine {
    type Handle = StubHandle;

    fn open(&self, _stream: File) -> Result<StubHandle, EngineError> {
        if let Some(status) = self.fail_open {
            return Err(EngineError::new(status, "scripted open failure"));
        }
        self.counters.opens.set(self.counters.opens.get() + 1);
        Ok(StubHandle {
            entries: self.entries.clone(),
            counters: self.counters.clone(),
            fail_extract: self.fail_extract,
        })
    }
}

impl ArchiveHandle for StubHandle {
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, index: usize) -> EntryDescriptor {
        let entry = &self.entries[index];
        EntryDescriptor {
            index,
            is_directory: entry.is_directory,
            attributes: entry.attributes,
        }
    }

    fn decoded_name_len(&self, index: usize) -> usize {
        self.entries[index].name.len() + 1
    }

    fn decoded_name(&self, index: usize, dest: &mut [u16]) {
        let name = &self.entries[index].name;
        dest[..name.len()].copy_from_slice(name);
        dest[name.len()] = 0;
    }

    fn extract(&mut self, index: usize, cache: &mut BlockCache) -> Result<Extracted, EngineError> {
        if let Some((at, status)) = self.fail_extract {
            if at == index {
                return Err(EngineError::new(status, "scripted extract failure"));
            }
        }

        let block = match self.entries[index].block {
            Some(block) => block,
            None => return Ok(Extracted::default()),
        };

        let members = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.block == Some(block));
        let offset = members
            .clone()
            .take_while(|(i, _)| *i < index)
            .map(|(_, e)| e.data.len())
            .sum();
        let size = members.clone().map(|(_, e)| e.data.len()).sum();

        if !cache.holds(block) {
            self.counters.decodes.set(self.counters.decodes.get() + 1);
            cache.load(block, size, |staging: &mut [u8]| {
                let mut pos = 0;
                for (_, e) in members {
                    staging[pos..pos + e.data.len()].copy_from_slice(&e.data);
                    pos += e.data.len();
                }
                Ok::<(), EngineError>(())
            })?;
        }

        Ok(Extracted {
            offset,
            len: self.entries[index].data.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateDir(PathBuf),
    Open(PathBuf),
    Write(PathBuf, Vec<u8>),
    Close(PathBuf),
    SetAttributes(PathBuf, u32),
}

/// Records every filesystem call instead of touching the disk.
#[derive(Debug, Default)]
pub struct RecordingFs {
    pub events: Vec<Event>,
    pub short_write: bool,
}

impl Filesystem for RecordingFs {
    type File = PathBuf;

    fn create_dir(&mut self, path: &Path) -> io::Result<DirStatus> {
        let exists = self.events.contains(&Event::CreateDir(path.to_path_buf()));
        self.events.push(Event::CreateDir(path.to_path_buf()));
        Ok(if exists {
            DirStatus::AlreadyExists
        } else {
            DirStatus::Created
        })
    }

    fn open_for_write(&mut self, path: &Path) -> io::Result<PathBuf> {
        self.events.push(Event::Open(path.to_path_buf()));
        Ok(path.to_path_buf())
    }

    fn write(&mut self, file: &mut PathBuf, bytes: &[u8]) -> io::Result<usize> {
        self.events.push(Event::Write(file.clone(), bytes.to_vec()));
        match self.short_write && !bytes.is_empty() {
            true => Ok(bytes.len() - 1),
            false => Ok(bytes.len()),
        }
    }

    fn close(&mut self, file: PathBuf) -> io::Result<()> {
        self.events.push(Event::Close(file));
        Ok(())
    }

    fn set_attributes(&mut self, path: &Path, attributes: u32) {
        self.events
            .push(Event::SetAttributes(path.to_path_buf(), attributes));
    }
}

/// A scratch directory holding an (empty) archive file for the stub engine
/// and an output root.
pub struct Workspace {
    pub temp: TempDir,
    pub archive: PathBuf,
    pub out: PathBuf,
}

impl Workspace {
    pub fn new() -> Workspace {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("stub.7z");
        std::fs::write(&archive, b"").unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir(&out).unwrap();
        Workspace { temp, archive, out }
    }

    pub fn fs(&self) -> StdFilesystem {
        StdFilesystem::new(&self.out)
    }

    /// Relative paths of everything below the output root, sorted, with
    /// directories suffixed by `/`.
    pub fn tree(&self) -> Vec<String> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                if path.is_dir() {
                    out.push(format!("{}/", rel));
                    walk(root, &path, out);
                } else {
                    out.push(rel);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.out, &self.out, &mut out);
        out.sort();
        out
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.out.join(rel)).unwrap()
    }
}

/// `rel` with `/` replaced by the platform separator.
pub fn platform(rel: &str) -> PathBuf {
    rel.split('/').collect()
}
