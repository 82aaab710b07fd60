use std::path::Path;

use humansize::{format_size, BINARY};
use unpack7_core::{ExtractOptions, ExtractStats, Extractor, SevenZipEngine, StdFilesystem};

use crate::cli::ExtractArgs;
use crate::error::{Error, Result};

pub fn run(args: ExtractArgs) -> Result<()> {
    let output_path = match args.output {
        Some(path) => path,
        None => std::env::current_dir().map_err(|source| Error::CurrentDir { source })?,
    };

    std::fs::create_dir_all(&output_path).map_err(|source| Error::CreateOutput {
        path: output_path.clone(),
        source,
    })?;

    let options = ExtractOptions {
        charset: args.charset,
        apply_attributes: !args.no_attributes,
    };
    let mut extractor =
        Extractor::with_options(SevenZipEngine, StdFilesystem::new(&output_path), options);

    let stats = match &args.name {
        Some(name) => extractor.extract_one(&args.archive, name),
        None => extractor.extract_all(&args.archive, !args.flat),
    }
    .map_err(|source| Error::extract(&args.archive, source))?;

    if args.quiet {
        return Ok(());
    }

    if let (Some(name), 0) = (&args.name, stats.files_extracted) {
        eprintln!("WARNING: no file named `{}` in {}", name, args.archive.display());
    }

    println!("{}", summary(&stats, &output_path));

    Ok(())
}

fn summary(stats: &ExtractStats, output_path: &Path) -> String {
    format!(
        "Extracted {} files ({}) to {}",
        stats.files_extracted,
        format_size(stats.bytes_written, BINARY),
        output_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_binary_sizes() {
        let stats = ExtractStats {
            files_extracted: 3,
            directories_created: 1,
            bytes_written: 2048,
        };

        assert_eq!(
            summary(&stats, Path::new("out")),
            "Extracted 3 files (2 KiB) to out"
        );
    }
}
