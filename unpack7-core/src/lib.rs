//! Listing and extraction of 7z archives on top of a pluggable decoding
//! engine.
//!
//! ```no_run
//! use std::path::Path;
//! use unpack7_core::{Extractor, SevenZipEngine, StdFilesystem};
//!
//! let mut extractor = Extractor::new(SevenZipEngine, StdFilesystem::new("out"));
//! let stats = extractor.extract_all(Path::new("archive.7z"), true)?;
//! println!("{} files", stats.files_extracted);
//! # Ok::<(), unpack7_core::Error>(())
//! ```

mod buffer;
pub mod engine;
mod error;
mod extract;
mod fs;
pub mod path;
pub mod transcode;

pub use buffer::{AllocError, GrowBuffer};
pub use engine::{ArchiveEngine, ArchiveHandle, BlockCache, EntryDescriptor, Extracted};
#[cfg(feature = "sevenz")]
pub use engine::{SevenZipArchive, SevenZipEngine};
pub use error::{EngineError, Error, Result, Status};
pub use extract::{ExtractOptions, ExtractStats, Extractor};
pub use fs::{
    DirStatus, Filesystem, StdFilesystem, FILE_ATTRIBUTE_READONLY, FILE_ATTRIBUTE_UNIX_EXTENSION,
};
pub use transcode::{Charset, TranscodeError, Transcoder};
