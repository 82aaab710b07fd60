use std::fs::File;
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::Path;

use tracing::{debug, error, info};

use crate::buffer::GrowBuffer;
use crate::engine::{ArchiveEngine, ArchiveHandle, BlockCache, EntryDescriptor, Extracted};
use crate::error::{EngineError, Error, Result, Status};
use crate::fs::{DirStatus, Filesystem};
use crate::path;
use crate::transcode::{Charset, Transcoder};

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Encoding that entry names are transcoded to before they become paths.
    pub charset: Charset,
    /// Propagate archive attributes onto extracted files.
    pub apply_attributes: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            charset: Charset::Utf8,
            apply_attributes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files_extracted: u64,
    pub directories_created: u64,
    pub bytes_written: u64,
}

impl AddAssign for ExtractStats {
    fn add_assign(&mut self, other: Self) {
        self.files_extracted += other.files_extracted;
        self.directories_created += other.directories_created;
        self.bytes_written += other.bytes_written;
    }
}

/// Drives an archive engine over one archive per call and writes what it
/// decodes through a [`Filesystem`].
///
/// Every call opens its own handle and owns its own staging buffers; all of
/// them are released when the call returns, whether it succeeded or not. The
/// first failure aborts the call. Files written before it are left in place.
#[derive(Debug)]
pub struct Extractor<E, F> {
    engine: E,
    fs: F,
    options: ExtractOptions,
}

impl<E: ArchiveEngine, F: Filesystem> Extractor<E, F> {
    pub fn new(engine: E, fs: F) -> Extractor<E, F> {
        Self::with_options(engine, fs, ExtractOptions::default())
    }

    pub fn with_options(engine: E, fs: F, options: ExtractOptions) -> Extractor<E, F> {
        Extractor {
            engine,
            fs,
            options,
        }
    }

    #[inline(always)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline(always)]
    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    #[inline(always)]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn into_parts(self) -> (E, F) {
        (self.engine, self.fs)
    }

    /// Prints a header and then every entry name, one per line, in index
    /// order. Returns the number of entries.
    pub fn list_entries<W: Write>(&self, archive: &Path, out: &mut W) -> Result<usize> {
        let stream = open_input(archive)?;

        writeln!(out, "Contents of archive {}:\n", archive.display())
            .map_err(|source| Error::Print { source })?;

        let handle = self.open_archive(archive, stream)?;
        let mut names = GrowBuffer::new();
        let mut transcoder = Transcoder::new(self.options.charset);

        let count = handle.entry_count();
        for index in 0..count {
            let name = stage_name(&handle, index, &mut names)?;
            let name = transcoder
                .to_narrow(name)
                .map_err(|source| Error::DecodeName { index, source })?;

            out.write_all(name)
                .and_then(|_| out.write_all(b"\n"))
                .map_err(|source| Error::Print { source })?;
        }

        Ok(count)
    }

    /// Extracts every file whose final name component equals `target` into
    /// the root of the filesystem, under that final component.
    ///
    /// Scanning continues past a match, so when several entries share the
    /// name the last one wins.
    pub fn extract_one(&mut self, archive: &Path, target: &str) -> Result<ExtractStats> {
        let mut handle = self.open(archive)?;
        let mut cache = BlockCache::new();
        let mut names = GrowBuffer::new();
        let mut transcoder = Transcoder::new(self.options.charset);
        let mut stats = ExtractStats::default();

        let target = {
            let units: Vec<u16> = target.encode_utf16().collect();
            let mut encoder = Transcoder::new(self.options.charset);
            encoder
                .to_narrow(&units)
                .map_err(|source| Error::EncodeTarget {
                    name: target.to_string(),
                    source,
                })?
                .to_vec()
        };

        for index in 0..handle.entry_count() {
            let entry = handle.entry(index);
            if entry.is_directory {
                continue;
            }

            let name = stage_name(&handle, index, &mut names)?;
            let name = transcoder
                .to_narrow(name)
                .map_err(|source| Error::DecodeName { index, source })?;

            let dest = path::terminal_component(name);
            if dest != target.as_slice() {
                continue;
            }
            check_name(dest)?;

            let extracted = extract_entry(&mut handle, index, &mut cache)?;
            self.write_file(&entry, dest, &cache, extracted, &mut stats)?;
        }

        Ok(stats)
    }

    /// Extracts every entry. With `preserve_directories` the relative
    /// directory tree is rebuilt, directory entries included; without it
    /// every file lands in the root under its final name component and
    /// directory entries are skipped.
    pub fn extract_all(&mut self, archive: &Path, preserve_directories: bool) -> Result<ExtractStats> {
        let mut handle = self.open(archive)?;
        let mut cache = BlockCache::new();
        let mut names = GrowBuffer::new();
        let mut transcoder = Transcoder::new(self.options.charset);
        let mut stats = ExtractStats::default();

        for index in 0..handle.entry_count() {
            let entry = handle.entry(index);
            if entry.is_directory && !preserve_directories {
                continue;
            }

            let name = stage_name(&handle, index, &mut names)?;
            let name = transcoder
                .to_narrow(name)
                .map_err(|source| Error::DecodeName { index, source })?;
            check_name(name)?;

            let extracted = match entry.is_directory {
                true => None,
                false => Some(extract_entry(&mut handle, index, &mut cache)?),
            };

            let dest: &[u8] = if preserve_directories {
                stats.directories_created += path::materialize_parents(name, &mut self.fs)?;
                &*name
            } else {
                path::terminal_component(name)
            };

            match extracted {
                None => {
                    if path::create_dir(&mut self.fs, dest)? == DirStatus::Created {
                        stats.directories_created += 1;
                    }
                }
                Some(extracted) => self.write_file(&entry, dest, &cache, extracted, &mut stats)?,
            }
        }

        debug!(
            files = stats.files_extracted,
            directories = stats.directories_created,
            bytes = stats.bytes_written,
            "extraction finished"
        );
        Ok(stats)
    }

    fn open(&self, archive: &Path) -> Result<E::Handle> {
        let stream = open_input(archive)?;
        self.open_archive(archive, stream)
    }

    fn open_archive(&self, archive: &Path, stream: File) -> Result<E::Handle> {
        let handle = self
            .engine
            .open(stream)
            .map_err(|source| Error::OpenArchive {
                path: archive.to_path_buf(),
                source,
            })?;

        debug!(
            path = %archive.display(),
            entries = handle.entry_count(),
            "opened archive"
        );
        Ok(handle)
    }

    fn write_file(
        &mut self,
        entry: &EntryDescriptor,
        dest: &[u8],
        cache: &BlockCache,
        extracted: Extracted,
        stats: &mut ExtractStats,
    ) -> Result<()> {
        let path = path::to_path(dest);
        let bytes = cache.bytes(extracted).ok_or_else(|| Error::ExtractEntry {
            index: entry.index,
            source: EngineError::new(Status::Data, "extracted range lies outside the decoded block"),
        })?;

        let mut file = self.fs.open_for_write(&path).map_err(|source| {
            error!(path = %path.display(), "can not open output file");
            Error::OpenOutput {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let written = self.fs.write(&mut file, bytes).and_then(|written| match written {
            n if n == bytes.len() => Ok(n),
            n => Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("wrote {} of {} bytes", n, bytes.len()),
            )),
        });
        if let Err(source) = written {
            error!(path = %path.display(), "can not write output file");
            return Err(Error::WriteOutput {
                path: path.to_path_buf(),
                source,
            });
        }

        self.fs.close(file).map_err(|source| {
            error!(path = %path.display(), "can not close output file");
            Error::CloseOutput {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if let (Some(attributes), true) = (entry.attributes, self.options.apply_attributes) {
            self.fs.set_attributes(&path, attributes);
        }

        info!(path = %path.display(), bytes = bytes.len(), "extracted");
        stats.files_extracted += 1;
        stats.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

fn open_input(archive: &Path) -> Result<File> {
    File::open(archive).map_err(|source| {
        error!(path = %archive.display(), "can not open input file");
        Error::OpenInput {
            path: archive.to_path_buf(),
            source,
        }
    })
}

/// Copies the entry's name into `names`, growing it only when the name does
/// not fit.
fn stage_name<'a, H: ArchiveHandle>(
    handle: &H,
    index: usize,
    names: &'a mut GrowBuffer<u16>,
) -> Result<&'a [u16]> {
    let len = handle.decoded_name_len(index);
    names
        .ensure_capacity(len)
        .map_err(|source| Error::StageName { index, source })?;
    handle.decoded_name(index, &mut names.as_mut_slice()[..len]);
    Ok(&names.as_slice()[..len])
}

fn extract_entry<H: ArchiveHandle>(
    handle: &mut H,
    index: usize,
    cache: &mut BlockCache,
) -> Result<Extracted> {
    handle
        .extract(index, cache)
        .map_err(|source| Error::ExtractEntry { index, source })
}

fn check_name(name: &[u8]) -> Result<()> {
    path::check(name).map_err(|source| {
        error!(name = %String::from_utf8_lossy(name), "unsafe entry name");
        Error::UnsafePath {
            name: String::from_utf8_lossy(name).into_owned(),
            source,
        }
    })
}
