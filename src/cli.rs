use clap::Parser;
use std::path::PathBuf;

/// Read EPUB ebooks page by page in the terminal
#[derive(Parser, Debug)]
#[command(name = "termread", version, about)]
pub struct Cli {
    /// Path to the EPUB file to read
    pub input: Option<PathBuf>,

    /// Directory holding per-book reading progress.
    /// Defaults to `termread` under the user cache directory.
    #[arg(long, env = "TERMREAD_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory images are exported into, one subdirectory per book
    #[arg(long, env = "TERMREAD_IMG_DIR", default_value = "img")]
    pub img_dir: PathBuf,

    /// Re-paginate for the current terminal size even if progress is cached
    #[arg(long, default_value_t = false)]
    pub reflow: bool,

    /// Write log records to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
