use std::io::Write;
use std::path::Path;

use unpack7_core::{ExtractOptions, Extractor, SevenZipEngine, StdFilesystem};

use crate::cli::ListArgs;
use crate::error::{Error, Result};

pub fn run(args: ListArgs) -> Result<()> {
    let options = ExtractOptions {
        charset: args.charset,
        ..Default::default()
    };
    // Listing never writes, so the root is irrelevant.
    let extractor = Extractor::with_options(SevenZipEngine, StdFilesystem::new("."), options);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let count = extractor
        .list_entries(&args.archive, &mut out)
        .map_err(|source| Error::list(&args.archive, source))?;
    flush(&args.archive, &mut out)?;

    tracing::debug!(entries = count, "listed archive");
    Ok(())
}

fn flush<W: Write>(archive: &Path, out: &mut W) -> Result<()> {
    out.flush().map_err(|source| {
        Error::list(archive, unpack7_core::Error::Print { source })
    })
}
