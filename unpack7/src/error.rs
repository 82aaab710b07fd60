use std::path::{Path, PathBuf};

use miette::Diagnostic;
use unpack7_core::Status;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Cannot list archive `{}`", .path.display())]
    List {
        path: PathBuf,
        #[source]
        source: unpack7_core::Error,
        #[help]
        help: String,
    },

    #[error("Cannot extract archive `{}`", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: unpack7_core::Error,
        #[help]
        help: String,
    },

    #[error("Cannot create output directory `{}`", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot determine current directory")]
    #[diagnostic(help("Pass an output directory with -o/--output"))]
    CurrentDir {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn list(path: &Path, source: unpack7_core::Error) -> Error {
        Error::List {
            path: path.to_path_buf(),
            help: describe(source.status()),
            source,
        }
    }

    pub fn extract(path: &Path, source: unpack7_core::Error) -> Error {
        Error::Extract {
            path: path.to_path_buf(),
            help: describe(source.status()),
            source,
        }
    }
}

fn describe(status: Status) -> String {
    match status.category() {
        Some(category) => format!("ERROR #{}: {}", status.code(), category),
        None => format!("ERROR #{} ({})", status.code(), status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unpack7_core::EngineError;

    #[test]
    fn help_names_category() {
        let err = Error::extract(
            Path::new("a.7z"),
            unpack7_core::Error::ExtractEntry {
                index: 0,
                source: EngineError::new(Status::Crc, "bad block"),
            },
        );

        let help = err.help().map(|h| h.to_string());
        assert_eq!(help.as_deref(), Some("ERROR #3: CRC error"));
    }

    #[test]
    fn help_falls_back_to_code() {
        assert_eq!(describe(Status::Fail), "ERROR #11 (FAIL)");
    }
}
