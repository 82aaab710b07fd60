use std::path::PathBuf;

use clap::{Parser, Subcommand};
use unpack7_core::Charset;

#[derive(Debug, Parser)]
#[command(name = "unpack7", about = "List and extract 7z archives.", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(visible_alias = "l", about = "List files in an archive")]
    List(ListArgs),

    #[command(visible_alias = "x", about = "Extract files from an archive")]
    Extract(ExtractArgs),
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    /// Path to the .7z archive
    pub archive: PathBuf,

    /// Encoding used to print entry names
    #[arg(long, default_value = "utf8", value_name = "CHARSET")]
    pub charset: Charset,
}

#[derive(Debug, clap::Args)]
#[command(after_help = "\
\x1b[1m\x1b[4mExamples:\x1b[0m
  unpack7 x archive.7z
  unpack7 x archive.7z -o out/
  unpack7 x --flat archive.7z
  unpack7 x archive.7z readme.txt")]
pub struct ExtractArgs {
    /// Path to the .7z archive to extract
    pub archive: PathBuf,

    /// Extract only files with this name, ignoring their directories
    pub name: Option<String>,

    /// Output directory (defaults to current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write every file into the output directory, skipping directory entries
    #[arg(short = 'e', long)]
    pub flat: bool,

    /// Encoding used for output file names (utf8, ascii, latin1)
    #[arg(long, default_value = "utf8", value_name = "CHARSET")]
    pub charset: Charset,

    /// Don't apply archived attributes to extracted files
    #[arg(long)]
    pub no_attributes: bool,

    /// Suppress output (quiet mode)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
