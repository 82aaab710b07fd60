use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::buffer::AllocError;
use crate::path::PathError;
use crate::transcode::TranscodeError;

pub type Result<T> = std::result::Result<T, Error>;

/// Result codes shared with the archive engine, as numbered at the process
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Data = 1,
    Mem = 2,
    Crc = 3,
    Unsupported = 4,
    Param = 5,
    InputEof = 6,
    OutputEof = 7,
    Read = 8,
    Write = 9,
    Progress = 10,
    Fail = 11,
    Thread = 12,
    Archive = 16,
    NoArchive = 17,
}

impl Status {
    const ALL: [Status; 15] = [
        Status::Ok,
        Status::Data,
        Status::Mem,
        Status::Crc,
        Status::Unsupported,
        Status::Param,
        Status::InputEof,
        Status::OutputEof,
        Status::Read,
        Status::Write,
        Status::Progress,
        Status::Fail,
        Status::Thread,
        Status::Archive,
        Status::NoArchive,
    ];

    #[inline(always)]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Status> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Data => "DATA",
            Status::Mem => "MEM",
            Status::Crc => "CRC",
            Status::Unsupported => "UNSUPPORTED",
            Status::Param => "PARAM",
            Status::InputEof => "INPUT_EOF",
            Status::OutputEof => "OUTPUT_EOF",
            Status::Read => "READ",
            Status::Write => "WRITE",
            Status::Progress => "PROGRESS",
            Status::Fail => "FAIL",
            Status::Thread => "THREAD",
            Status::Archive => "ARCHIVE",
            Status::NoArchive => "NO_ARCHIVE",
        }
    }

    /// Human-readable category for the codes a user can act on.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            Status::Unsupported => Some("decoder doesn't support this archive"),
            Status::Mem => Some("can not allocate memory"),
            Status::Crc => Some("CRC error"),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the archive engine, carrying its own status.
#[derive(Debug, thiserror::Error)]
#[error("{message} ({status})")]
pub struct EngineError {
    status: Status,
    message: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    pub fn new<M: Into<Cow<'static, str>>>(status: Status, message: M) -> EngineError {
        EngineError {
            status,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<M, E>(status: Status, message: M, source: E) -> EngineError
    where
        M: Into<Cow<'static, str>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        EngineError {
            status,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[inline(always)]
    pub fn status(&self) -> Status {
        self.status
    }
}

impl From<AllocError> for EngineError {
    fn from(err: AllocError) -> Self {
        EngineError::with_source(Status::Mem, "cannot allocate block staging buffer", err)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can not open input file `{}`", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("cannot extract entry #{index}")]
    ExtractEntry {
        index: usize,
        #[source]
        source: EngineError,
    },

    #[error("cannot stage name of entry #{index}")]
    StageName {
        index: usize,
        #[source]
        source: AllocError,
    },

    #[error("cannot decode name of entry #{index}")]
    DecodeName {
        index: usize,
        #[source]
        source: TranscodeError,
    },

    #[error("cannot encode requested name `{name}`")]
    EncodeTarget {
        name: String,
        #[source]
        source: TranscodeError,
    },

    #[error("refusing to extract entry `{name}`")]
    UnsafePath {
        name: String,
        #[source]
        source: PathError,
    },

    #[error("can not create directory `{}`", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can not open output file `{}`", .path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can not write output file `{}`", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can not close output file `{}`", .path.display())]
    CloseOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot print archive listing")]
    Print {
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// The legacy result code for this failure. Engine failures keep the
    /// engine's code; everything the orchestrator detects itself is `FAIL`
    /// unless it is an allocation failure.
    pub fn status(&self) -> Status {
        match self {
            Error::OpenArchive { source, .. } | Error::ExtractEntry { source, .. } => {
                source.status()
            }
            Error::StageName { .. }
            | Error::DecodeName {
                source: TranscodeError::Alloc(_),
                ..
            }
            | Error::EncodeTarget {
                source: TranscodeError::Alloc(_),
                ..
            } => Status::Mem,
            Error::Print { .. } => Status::Write,
            _ => Status::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_numbers() {
        assert_eq!(Status::Crc.code(), 3);
        assert_eq!(Status::NoArchive.code(), 17);
        assert_eq!(Status::from_code(16), Some(Status::Archive));
        assert_eq!(Status::from_code(13), None);
    }

    #[test]
    fn engine_status_is_surfaced_unmodified() {
        let err = Error::ExtractEntry {
            index: 4,
            source: EngineError::new(Status::Crc, "bad block"),
        };
        assert_eq!(err.status(), Status::Crc);
        assert_eq!(err.status().category(), Some("CRC error"));
    }

    #[test]
    fn filesystem_failures_are_generic() {
        let err = Error::OpenOutput {
            path: "out.txt".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.status(), Status::Fail);
        assert_eq!(err.to_string(), "can not open output file `out.txt`");
    }

    #[test]
    fn unpaired_surrogate_is_fail() {
        let err = Error::DecodeName {
            index: 0,
            source: TranscodeError::UnpairedSurrogate { position: 2 },
        };
        assert_eq!(err.status(), Status::Fail);
    }
}
