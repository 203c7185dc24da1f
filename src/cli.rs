use clap::Parser;
use std::path::PathBuf;

use comix::Preferences;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q             : Quit
  Right / Space / PgDn: Next page
  Left / PgUp / BkSp  : Previous page
  Home                : First page
  End                 : Last page
  d                   : Toggle double page mode
  m                   : Toggle manga mode (right-to-left spreads)
  w                   : Toggle single display of wide pages
  f                   : Toggle fullscreen
  i                   : Toggle file info in the title bar
  c                   : Print the archive comments to stdout
  o                   : Open the next archive in the directory
  O                   : Open the previous archive in the directory
";

#[derive(Parser)]
#[command(name = "comix", about = "A comic book viewer", after_help = HELP_KEYS)]
pub struct Cli {
    /// Archive (cbz/cbr/cbt/cb7/zip/rar/tar/7z), directory or image to open
    pub path: PathBuf,

    /// Page to open at (1-based). 0 opens at the last page.
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pub page: i64,

    /// Show two pages side by side
    #[arg(short, long)]
    pub double_page: bool,

    /// Read right-to-left
    #[arg(short, long)]
    pub manga: bool,

    /// Do not keep neighbouring pages decoded
    #[arg(long)]
    pub no_cache: bool,

    /// Move one page at a time even in double page mode
    #[arg(long)]
    pub single_step: bool,

    /// Show a wide page alone even in double page mode
    #[arg(long)]
    pub no_double_for_wide: bool,

    /// Do not open the next/previous archive at the ends of the current one
    #[arg(long)]
    pub no_auto_open: bool,

    /// Extensions treated as comment files (repeatable). Default: txt, nfo.
    #[arg(long = "comment-ext", value_name = "EXT")]
    pub comment_ext: Vec<String>,
}

impl Cli {
    pub fn preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        Preferences {
            double_page: self.double_page,
            manga_mode: self.manga,
            cache: !self.no_cache,
            double_step: !self.single_step,
            no_double_page_for_wide_images: self.no_double_for_wide,
            auto_open_next_archive: !self.no_auto_open,
            comment_extensions: if self.comment_ext.is_empty() {
                defaults.comment_extensions
            } else {
                self.comment_ext.clone()
            },
        }
    }
}
