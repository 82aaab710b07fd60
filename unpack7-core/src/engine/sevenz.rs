//! Engine backed by the `sevenz-rust` decoder.

use std::fs::File;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};

use sevenz_rust::{Archive, BlockDecoder, SevenZArchiveEntry};

use super::{ArchiveEngine, ArchiveHandle, BlockCache, EntryDescriptor, Extracted};
use crate::error::{EngineError, Status};

/// Encryption is not supported, so every archive is opened without one.
const NO_PASSWORD: &[u8] = &[];

#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZipEngine;

impl ArchiveEngine for SevenZipEngine {
    type Handle = SevenZipArchive;

    fn open(&self, mut stream: File) -> Result<SevenZipArchive, EngineError> {
        let len = stream
            .metadata()
            .map_err(|e| EngineError::with_source(Status::Read, "cannot stat archive", e))?
            .len();

        let archive = guard(|| Archive::read(&mut stream, len, NO_PASSWORD))?.map_err(map_error)?;
        tracing::debug!(
            files = archive.files.len(),
            blocks = archive.folders.len(),
            "parsed 7z index"
        );

        Ok(SevenZipArchive { archive, stream })
    }
}

pub struct SevenZipArchive {
    archive: Archive,
    stream: File,
}

impl SevenZipArchive {
    /// Offset of `index` within `block`, and the unpacked size of the block.
    ///
    /// Entries of a block are contiguous in the index, interleaved only with
    /// entries that carry no data stream.
    fn locate(&self, index: usize, block: usize) -> Result<(usize, usize), EngineError> {
        let map = &self.archive.stream_map;
        let first = map
            .folder_first_file_index
            .get(block)
            .copied()
            .ok_or_else(|| EngineError::new(Status::Data, "block missing from index"))?;
        let mut offset = 0usize;
        let mut total = 0usize;

        for (i, (file, folder)) in self
            .archive
            .files
            .iter()
            .zip(&map.file_folder_index)
            .enumerate()
            .skip(first)
        {
            match folder {
                Some(f) if *f == block => {}
                Some(_) => break,
                None => continue,
            }
            let size = entry_size(file)?;
            if i < index {
                offset = offset.checked_add(size).ok_or_else(oversized)?;
            }
            total = total.checked_add(size).ok_or_else(oversized)?;
        }

        Ok((offset, total))
    }
}

fn entry_size(file: &SevenZArchiveEntry) -> Result<usize, EngineError> {
    usize::try_from(file.size).map_err(|_| oversized())
}

fn oversized() -> EngineError {
    EngineError::new(Status::Data, "entry sizes in index overflow")
}

impl ArchiveHandle for SevenZipArchive {
    fn entry_count(&self) -> usize {
        self.archive.files.len()
    }

    fn entry(&self, index: usize) -> EntryDescriptor {
        let file = &self.archive.files[index];
        EntryDescriptor {
            index,
            is_directory: file.is_directory,
            attributes: file
                .has_windows_attributes
                .then_some(file.windows_attributes),
        }
    }

    fn decoded_name_len(&self, index: usize) -> usize {
        self.archive.files[index].name.encode_utf16().count() + 1
    }

    fn decoded_name(&self, index: usize, dest: &mut [u16]) {
        let units = self.archive.files[index]
            .name
            .encode_utf16()
            .chain(std::iter::once(0));
        for (slot, unit) in dest.iter_mut().zip(units) {
            *slot = unit;
        }
    }

    fn extract(&mut self, index: usize, cache: &mut BlockCache) -> Result<Extracted, EngineError> {
        let block = match self
            .archive
            .stream_map
            .file_folder_index
            .get(index)
            .copied()
            .flatten()
        {
            Some(block) => block,
            None => return Ok(Extracted::default()),
        };

        let (offset, size) = self.locate(index, block)?;
        let len = entry_size(&self.archive.files[index])?;

        if cache.holds(block) {
            tracing::trace!(index, block, "block cache hit");
        } else {
            let archive = &self.archive;
            let stream = &mut self.stream;
            cache.load(block, size, |staging| {
                decode_block(archive, block, stream, staging)
            })?;
        }

        Ok(Extracted { offset, len })
    }
}

fn decode_block(
    archive: &Archive,
    block: usize,
    stream: &mut File,
    staging: &mut [u8],
) -> Result<(), EngineError> {
    tracing::debug!(block, size = staging.len(), "decoding block");

    let mut pos: usize = 0;
    let mut failure: Option<io::Error> = None;

    let decoder = BlockDecoder::new(block, archive, NO_PASSWORD, stream);
    let decoded = guard(|| {
        decoder.for_each_entries(&mut |entry: &SevenZArchiveEntry, reader: &mut dyn Read| {
            let window = usize::try_from(entry.size)
                .ok()
                .and_then(|size| pos.checked_add(size))
                .and_then(|end| staging.get_mut(pos..end).map(|window| (end, window)));
            let (end, mut window) = match window {
                Some(window) => window,
                None => {
                    failure = Some(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "block is larger than its index claims",
                    ));
                    return Ok(false);
                }
            };

            // Reading to the end lets the decoder verify the entry checksum.
            match io::copy(reader, &mut window) {
                Ok(_) if window.is_empty() => {
                    pos = end;
                    Ok(true)
                }
                Ok(_) => {
                    failure = Some(io::ErrorKind::UnexpectedEof.into());
                    Ok(false)
                }
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
    })?;
    decoded.map_err(map_error)?;

    match failure {
        Some(e) if is_checksum_failure(&e) => {
            Err(EngineError::with_source(Status::Crc, "entry checksum mismatch", e))
        }
        Some(e) => Err(EngineError::with_source(Status::Data, "cannot decode block", e)),
        None => Ok(()),
    }
}

fn is_checksum_failure(error: &io::Error) -> bool {
    error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<sevenz_rust::Error>())
        .map(|inner| matches!(inner, sevenz_rust::Error::ChecksumVerificationFailed))
        .unwrap_or(false)
}

/// Runs a decoder call, turning a panic inside the decoder into `DATA`.
///
/// Corrupt LZMA streams can trip index assertions in `lzma-rust` instead of
/// returning an error.
fn guard<T, F: FnOnce() -> T>(f: F) -> Result<T, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::debug!(%message, "7z decoder panicked");
        EngineError::new(Status::Data, "7z decoder aborted on corrupt data")
    })
}

fn map_error(err: sevenz_rust::Error) -> EngineError {
    use sevenz_rust::Error as E;

    let status = match &err {
        E::BadSignature(..) => Status::NoArchive,
        E::ChecksumVerificationFailed | E::NextHeaderCrcMismatch => Status::Crc,
        E::UnsupportedVersion { .. }
        | E::UnsupportedCompressionMethod(..)
        | E::Unsupported(..)
        | E::ExternalUnsupported
        | E::PasswordRequired
        | E::MaybeBadPassword(..) => Status::Unsupported,
        E::MaxMemLimited { .. } => Status::Mem,
        E::Io(e, _) | E::FileOpen(e, _) => io_status(e),
        _ => Status::Data,
    };

    EngineError::with_source(status, "7z decoder failed", err)
}

/// Decoders report corrupt input as `InvalidData` / `InvalidInput`; only the
/// rest are real read failures.
fn io_status(error: &io::Error) -> Status {
    match error.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => Status::Data,
        io::ErrorKind::UnexpectedEof => Status::InputEof,
        _ => Status::Read,
    }
}
