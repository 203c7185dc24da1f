/// Read-only view settings the file handler consults.
///
/// The viewer owns the values; the file handler receives a copy and is told
/// about changes through `FileHandler::set_preferences`.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub double_page: bool,
    pub manga_mode: bool,
    /// Keep decoded neighbours of the current page around.
    pub cache: bool,
    /// Step two pages at a time while in double page mode.
    pub double_step: bool,
    /// Show a wide page on its own even in double page mode.
    pub no_double_page_for_wide_images: bool,
    pub auto_open_next_archive: bool,
    /// Extensions (without dot, case-insensitive) treated as comment files.
    pub comment_extensions: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            double_page: false,
            manga_mode: false,
            cache: true,
            double_step: true,
            no_double_page_for_wide_images: false,
            auto_open_next_archive: true,
            comment_extensions: vec!["txt".to_string(), "nfo".to_string()],
        }
    }
}

impl Preferences {
    pub fn is_comment_name(&self, name: &str) -> bool {
        let lower = name.trim_end().to_lowercase();
        self.comment_extensions.iter().any(|ext| {
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            !ext.is_empty()
                && lower.len() > ext.len()
                && lower.ends_with(&ext)
                && lower.as_bytes()[lower.len() - ext.len() - 1] == b'.'
        })
    }

    /// Number of pages shown side by side when two-page mode applies.
    pub fn depth(&self) -> usize {
        if self.double_page { 2 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_extension_match_is_case_insensitive() {
        let prefs = Preferences::default();
        assert!(prefs.is_comment_name("info.TXT"));
        assert!(prefs.is_comment_name("dir/readme.nfo "));
        assert!(!prefs.is_comment_name("page.jpg"));
        assert!(!prefs.is_comment_name("txt"));
        assert!(!prefs.is_comment_name("notxt"));
    }

    #[test]
    fn extensions_may_carry_a_dot() {
        let prefs = Preferences {
            comment_extensions: vec![".diz".to_string()],
            ..Preferences::default()
        };
        assert!(prefs.is_comment_name("FILE_ID.DIZ"));
    }
}
