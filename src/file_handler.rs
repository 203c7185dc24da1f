//! The file handler keeps track of pages, caches decoded images and reads
//! files for the viewer.
//!
//! Pages are numbered from 1 in this API. Callers must never read the files
//! behind `get_path_to_page` directly: archive members are extracted in the
//! background and may not exist yet. The accessors here wait for them.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tempfile::TempDir;

use crate::archive::{archive_format, ArchiveFormat, Coordinator, Extractor, WaitHandle, WaitOutcome};
use crate::cache::{self, PixelCache};
use crate::error::{ComixError, Result};
use crate::files::{
    collect_files_relative, delete_in_background, flattened_name, is_image_name, list_dir_sorted,
    member_destination, new_temp_dir, scan_images,
};
use crate::ordering::{apply_priority, priority_order, start_index};
use crate::page::{self, decode_image, Pixbuf};
use crate::prefs::Preferences;
use crate::sort::{alphanumeric_sort, alphanumeric_sort_paths};
use crate::status::{LogStatus, StatusSink};

/// Nested archives deeper than this are left packed.
pub const MAX_NESTING_DEPTH: usize = 8;

/// What should be on screen right now.
#[derive(Debug, Clone)]
pub enum Pages {
    Single(Arc<Pixbuf>),
    Double(Arc<Pixbuf>, Arc<Pixbuf>),
}

pub struct FileHandler {
    prefs: Preferences,
    status: Box<dyn StatusSink>,
    placeholder: Arc<Pixbuf>,

    file_loaded: bool,
    archive_type: Option<ArchiveFormat>,
    base_path: Option<PathBuf>,
    image_files: Vec<PathBuf>,
    comment_files: Vec<PathBuf>,
    /// Extracted path -> member name the coordinator knows it by.
    name_table: HashMap<PathBuf, String>,
    current_index: usize,
    /// Set while the current spread collapses to one page because a page is
    /// wide. Cleared whenever the cursor moves.
    virtual_double: bool,

    cache: PixelCache,
    extractor: Extractor,
    coordinator: Option<WaitHandle>,
    tmp_dir: Option<TempDir>,
}

impl FileHandler {
    pub fn new(prefs: Preferences) -> Result<Self> {
        Self::with_status(prefs, LogStatus)
    }

    pub fn with_status<S: StatusSink + 'static>(prefs: Preferences, status: S) -> Result<Self> {
        Ok(Self {
            prefs,
            status: Box::new(status),
            placeholder: page::missing_image(),
            file_loaded: false,
            archive_type: None,
            base_path: None,
            image_files: Vec::new(),
            comment_files: Vec::new(),
            name_table: HashMap::new(),
            current_index: 0,
            virtual_double: false,
            cache: PixelCache::new(),
            extractor: Extractor::new(),
            coordinator: None,
            tmp_dir: Some(new_temp_dir()?),
        })
    }

    pub fn set_placeholder(&mut self, placeholder: Arc<Pixbuf>) {
        self.placeholder = placeholder;
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Apply changed view settings. Comment extensions take effect on the
    /// next `open_file`.
    pub fn set_preferences(&mut self, prefs: Preferences) {
        self.prefs = prefs;
        self.virtual_double = false;
        self.reconcile_cache();
    }

    // -----------------------------------------------------------------------
    // Opening and closing
    // -----------------------------------------------------------------------

    /// Open an archive, a directory or an image. `start_page` counts from 1;
    /// zero or less means the last page.
    ///
    /// Failures are reported to the status sink and yield `false`.
    pub fn open_file(&mut self, path: &Path, start_page: i64) -> bool {
        match self.try_open(path, start_page) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}", e);
                self.status.set_message(e.to_string());
                false
            }
        }
    }

    fn try_open(&mut self, path: &Path, start_page: i64) -> Result<()> {
        let meta = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => ComixError::PermissionDenied(path.to_path_buf()),
            _ => ComixError::NotFound(path.to_path_buf()),
        })?;
        let is_dir = meta.is_dir();
        if !is_dir && !meta.is_file() {
            return Err(ComixError::NotFound(path.to_path_buf()));
        }
        let readable = if is_dir {
            fs::read_dir(path).map(|_| ())
        } else {
            File::open(path).map(|_| ())
        };
        if let Err(e) = readable {
            return Err(match e.kind() {
                ErrorKind::PermissionDenied => ComixError::PermissionDenied(path.to_path_buf()),
                _ => ComixError::Io(e),
            });
        }

        let format = if is_dir { None } else { ArchiveFormat::sniff(path)? };
        if format.is_none() && !is_dir && !is_image_name(&path.to_string_lossy()) {
            return Err(ComixError::UnknownFileType(path.to_path_buf()));
        }

        if self.file_loaded || self.base_path.is_some() {
            self.close_file();
        }

        let opened = match format {
            Some(format) => self.open_archive(path, format, start_page),
            None => self.open_images(path, is_dir, start_page),
        };
        if let Err(e) = opened {
            self.close_file();
            return Err(e);
        }

        if self.image_files.is_empty() {
            self.close_file();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            return Err(ComixError::EmptyArchive(name));
        }

        self.current_index = self.current_index.min(self.image_files.len() - 1);
        alphanumeric_sort_paths(&mut self.comment_files);
        self.file_loaded = true;
        log::info!(
            "Opened {} ({} pages, {} comments, starting at page {})",
            path.display(),
            self.image_files.len(),
            self.comment_files.len(),
            self.get_current_page()
        );
        Ok(())
    }

    fn open_archive(&mut self, path: &Path, format: ArchiveFormat, start_page: i64) -> Result<()> {
        let tmp = self.tmp_path()?;
        let coordinator = self.extractor.setup(path, &tmp)?;
        self.archive_type = Some(format);
        self.base_path = Some(path.to_path_buf());
        self.coordinator = Some(coordinator);

        let Members {
            images,
            comments,
            unknown,
        } = partition_members(self.extractor.get_members(), &self.prefs, &tmp);

        self.name_table.clear();
        self.image_files = Vec::with_capacity(images.len());
        for name in &images {
            self.track_path(&tmp, name, true);
        }
        for name in &comments {
            self.track_path(&tmp, name, false);
        }
        for name in &unknown {
            if let Some(p) = member_destination(&tmp, name) {
                self.name_table.insert(p, name.clone());
            }
        }

        let depth = self.prefs.depth();
        self.current_index = start_index(start_page, images.len(), depth);
        let mut order = images;
        let priority = priority_order(self.current_index, depth, order.len());
        apply_priority(&mut order, &priority);
        order.extend(comments);
        order.extend(unknown.iter().cloned());
        self.extractor.set_members(order);
        self.extractor.extract()?;

        if !unknown.is_empty() {
            self.unpack_subarchives(&tmp, &unknown, start_page)?;
        }
        Ok(())
    }

    fn track_path(&mut self, tmp: &Path, name: &str, image: bool) {
        let Some(path) = member_destination(tmp, name) else {
            log::warn!("Ignoring member with unsafe path: {}", name);
            return;
        };
        self.name_table.insert(path.clone(), name.to_string());
        if image {
            self.image_files.push(path);
        } else {
            self.comment_files.push(path);
        }
    }

    fn unpack_subarchives(&mut self, tmp: &Path, unknown: &[String], start_page: i64) -> Result<()> {
        let mut has_subarchive = false;
        for name in unknown {
            let Some(path) = member_destination(tmp, name) else { continue };
            self.wait_on_file(&path);
            if archive_format(&path).is_some() {
                if let Some(dir) = path.parent() {
                    has_subarchive |= open_subarchive(dir, &path, 1);
                }
            }
        }
        if !has_subarchive {
            return Ok(());
        }

        // Everything from the outer archive has to be on disk before files
        // are moved around.
        let members: Vec<PathBuf> = self.name_table.keys().cloned().collect();
        for path in &members {
            self.wait_on_file(path);
        }

        let mut flattened = Vec::new();
        for rel in collect_files_relative(tmp)? {
            let flat = flattened_name(&rel);
            if flat != rel {
                if let Err(e) = fs::rename(tmp.join(&rel), tmp.join(&flat)) {
                    log::warn!("Could not move {}: {}", rel, e);
                    continue;
                }
            }
            flattened.push(flat);
        }

        let mut images: Vec<String> = flattened.iter().filter(|n| is_image_name(n)).cloned().collect();
        alphanumeric_sort(&mut images);
        self.image_files.clear();
        self.comment_files.clear();
        self.name_table.clear();
        for name in &images {
            self.track_path(tmp, name, true);
        }
        let comments: Vec<String> = flattened
            .iter()
            .filter(|n| !is_image_name(n) && self.prefs.is_comment_name(n))
            .cloned()
            .collect();
        for name in &comments {
            self.track_path(tmp, name, false);
        }
        log::debug!(
            "Flattened nested archives: {} files, {} pages",
            flattened.len(),
            self.image_files.len()
        );

        self.extractor.set_members_extracted(flattened);
        self.current_index = start_index(start_page, self.image_files.len(), self.prefs.depth());
        Ok(())
    }

    fn open_images(&mut self, path: &Path, is_dir: bool, start_page: i64) -> Result<()> {
        let base = if is_dir {
            path.to_path_buf()
        } else {
            match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            }
        };
        self.image_files = scan_images(&base)?;
        self.current_index = if is_dir {
            start_index(start_page, self.image_files.len(), self.prefs.depth())
        } else {
            self.image_files
                .iter()
                .position(|p| p.file_name() == path.file_name())
                .unwrap_or(0)
        };
        self.base_path = Some(base);
        Ok(())
    }

    /// Forget the current document. Extraction is stopped and the temp dir
    /// is removed in the background; a fresh one is made for the next file.
    pub fn close_file(&mut self) {
        self.file_loaded = false;
        self.base_path = None;
        self.archive_type = None;
        self.image_files.clear();
        self.comment_files.clear();
        self.name_table.clear();
        self.current_index = 0;
        self.virtual_double = false;
        self.cache.clear();
        self.extractor.stop();
        self.coordinator = None;

        if let Some(old) = self.tmp_dir.take() {
            delete_in_background(old);
        }
        match new_temp_dir() {
            Ok(dir) => self.tmp_dir = Some(dir),
            Err(e) => log::error!("Could not create a temporary directory: {}", e),
        }
    }

    /// Shutdown: stop extraction and remove the temp dir before returning.
    pub fn cleanup(&mut self) {
        self.file_loaded = false;
        self.cache.clear();
        self.extractor.stop();
        self.coordinator = None;
        if let Some(dir) = self.tmp_dir.take() {
            if delete_in_background(dir).join().is_err() {
                log::error!("Temporary directory removal panicked");
            }
        }
    }

    fn tmp_path(&mut self) -> Result<PathBuf> {
        let dir = match self.tmp_dir.take() {
            Some(dir) => dir,
            None => new_temp_dir()?,
        };
        let path = dir.path().to_path_buf();
        self.tmp_dir = Some(dir);
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Pixbufs and the cache
    // -----------------------------------------------------------------------

    fn get_pixbuf(&mut self, index: usize) -> Arc<Pixbuf> {
        let Some(path) = self.image_files.get(index).cloned() else {
            return Arc::clone(&self.placeholder);
        };
        if let Some(hit) = self.cache.get(index) {
            return hit;
        }
        self.wait_on_file(&path);
        let placeholder = Arc::clone(&self.placeholder);
        self.cache
            .get_or_decode(index, || decode_or_placeholder(&path, placeholder))
    }

    /// The page(s) to display: two in double page mode unless `single`.
    pub fn get_pixbufs(&mut self, single: bool) -> Option<Pages> {
        if !self.file_loaded {
            return None;
        }
        self.virtual_double = self.get_virtual_double_page();
        let first = self.get_pixbuf(self.current_index);
        if single || !self.displayed_double() {
            return Some(Pages::Single(first));
        }
        let second = self.get_pixbuf(self.current_index + 1);
        Some(Pages::Double(first, second))
    }

    fn wanted_window(&self) -> Range<usize> {
        cache::wanted_window(
            self.current_index,
            self.image_files.len(),
            self.prefs.double_page,
            self.prefs.cache,
            self.backward_step_length(),
            self.forward_step_length(),
        )
    }

    fn reconcile_cache(&mut self) {
        let window = self.wanted_window();
        self.cache.reconcile(&window);
    }

    /// Trim the cache to the pages around the cursor and decode the ones in
    /// that window that are still missing.
    pub fn do_caching(&mut self) {
        if !self.file_loaded {
            return;
        }
        let window = self.wanted_window();
        self.cache.reconcile(&window);
        let missing = self.cache.missing(&window);
        if missing.is_empty() {
            return;
        }

        let image_files = &self.image_files;
        let name_table = &self.name_table;
        let coordinator = self.coordinator.as_deref().filter(|_| self.archive_type.is_some());
        let placeholder = &self.placeholder;
        let decoded: Vec<(usize, Arc<Pixbuf>)> = missing
            .par_iter()
            .filter_map(|&idx| {
                let path = image_files.get(idx)?;
                wait_for(coordinator, name_table, path);
                Some((idx, decode_or_placeholder(path, Arc::clone(placeholder))))
            })
            .collect();
        for (idx, pixbuf) in decoded {
            self.cache.insert(idx, pixbuf);
        }
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn page_changed(&mut self, old_page: usize) -> bool {
        self.current_index = self
            .current_index
            .min(self.image_files.len().saturating_sub(1));
        self.virtual_double = false;
        self.reconcile_cache();
        log::debug!("[nav] page {} -> {}", old_page, self.get_current_page());
        old_page != self.get_current_page()
    }

    pub fn next_page(&mut self) -> bool {
        if !self.file_loaded && self.base_path.is_none() {
            return false;
        }
        let old_page = self.get_current_page();
        let viewed = if self.displayed_double() { 2 } else { 1 };
        if old_page + viewed > self.get_number_of_pages() {
            if self.prefs.auto_open_next_archive && self.archive_type.is_some() {
                self.open_next_archive();
            }
            return false;
        }
        self.current_index += self.forward_step_length();
        self.page_changed(old_page)
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.file_loaded && self.base_path.is_none() {
            return false;
        }
        if self.get_current_page() == 1 {
            if self.prefs.auto_open_next_archive && self.archive_type.is_some() {
                self.open_previous_archive();
            }
            return false;
        }
        let old_page = self.get_current_page();
        let step = self.backward_step_length().min(self.current_index);
        self.current_index -= step;
        self.virtual_double = false;
        if step == 2 && self.get_virtual_double_page() {
            self.current_index += 1;
        }
        self.page_changed(old_page)
    }

    pub fn first_page(&mut self) -> bool {
        if !self.file_loaded {
            return false;
        }
        let old_page = self.get_current_page();
        self.current_index = 0;
        self.page_changed(old_page)
    }

    pub fn last_page(&mut self) -> bool {
        if !self.file_loaded {
            return false;
        }
        let old_page = self.get_current_page();
        let pages = self.get_number_of_pages();
        let offset = self.prefs.depth().min(pages);
        self.current_index = pages - offset;
        self.virtual_double = false;
        if offset == 2 && self.get_virtual_double_page() {
            self.current_index += 1;
        }
        self.page_changed(old_page)
    }

    pub fn set_page(&mut self, page_num: usize) -> bool {
        if !(1..=self.get_number_of_pages()).contains(&page_num) {
            return false;
        }
        let old_page = self.get_current_page();
        self.current_index = page_num - 1;
        self.page_changed(old_page)
    }

    fn forward_step_length(&self) -> usize {
        if self.displayed_double() && self.prefs.double_step { 2 } else { 1 }
    }

    fn backward_step_length(&self) -> usize {
        if self.prefs.double_page && self.prefs.double_step { 2 } else { 1 }
    }

    /// True when double page mode should show a single page here because
    /// one of the two pages is wider than it is tall.
    pub fn get_virtual_double_page(&mut self) -> bool {
        if !self.file_loaded
            || !self.prefs.double_page
            || !self.prefs.no_double_page_for_wide_images
            || self.get_current_page() == self.get_number_of_pages()
        {
            return false;
        }
        if self.get_pixbuf(self.current_index).is_wide() {
            return true;
        }
        self.get_pixbuf(self.current_index + 1).is_wide()
    }

    /// Whether two pages are on screen.
    pub fn displayed_double(&self) -> bool {
        self.prefs.double_page
            && !self.virtual_double
            && self.get_current_page() != self.get_number_of_pages()
    }

    pub fn is_last_page(&self) -> bool {
        if self.displayed_double() {
            self.get_current_page() + 1 >= self.get_number_of_pages()
        } else {
            self.get_current_page() == self.get_number_of_pages()
        }
    }

    fn sibling_archive(&self, forward: bool) -> Option<PathBuf> {
        let base = self.base_path.as_ref()?;
        let dir = match base.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = base.file_name()?.to_string_lossy().into_owned();
        let files = list_dir_sorted(&dir).ok()?;
        let pos = files.iter().position(|f| *f == name)?;
        let is_archive = |f: &&String| archive_format(&dir.join(f.as_str())).is_some();
        let found = if forward {
            files[pos + 1..].iter().find(is_archive)
        } else {
            files[..pos].iter().rev().find(is_archive)
        };
        found.map(|f| dir.join(f))
    }

    /// Open the archive after the current one in its directory.
    pub fn open_next_archive(&mut self) -> bool {
        match self.sibling_archive(true) {
            Some(path) => self.open_file(&path, 1),
            None => false,
        }
    }

    /// Open the archive before the current one, at its last page.
    pub fn open_previous_archive(&mut self) -> bool {
        match self.sibling_archive(false) {
            Some(path) => self.open_file(&path, 0),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn is_file_loaded(&self) -> bool {
        self.file_loaded
    }

    pub fn archive_format(&self) -> Option<ArchiveFormat> {
        self.archive_type
    }

    pub fn get_number_of_pages(&self) -> usize {
        self.image_files.len()
    }

    pub fn get_current_page(&self) -> usize {
        self.current_index + 1
    }

    fn page_index(&self, page: Option<usize>) -> Option<usize> {
        let idx = match page {
            None => self.current_index,
            Some(p) => p.checked_sub(1)?,
        };
        (idx < self.image_files.len()).then_some(idx)
    }

    /// Full path of `page` (the current page for `None`). The file may not
    /// have been extracted yet.
    pub fn get_path_to_page(&self, page: Option<usize>) -> Option<&Path> {
        self.page_index(page).map(|i| self.image_files[i].as_path())
    }

    pub fn get_path_to_base(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// The archive for archives, the viewed image otherwise.
    pub fn get_real_path(&self) -> Option<&Path> {
        if self.archive_type.is_some() {
            self.get_path_to_base()
        } else {
            self.get_path_to_page(None)
        }
    }

    pub fn get_page_filename(&self, page: Option<usize>) -> Option<String> {
        self.get_path_to_page(page)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// File names of `page` and the page after it.
    pub fn get_page_filenames_double(&self, page: Option<usize>) -> Option<(String, String)> {
        let first = self.page_index(page)? + 1;
        Some((
            self.get_page_filename(Some(first))?,
            self.get_page_filename(Some(first + 1))?,
        ))
    }

    pub fn get_base_filename(&self) -> Option<String> {
        self.base_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Archive name, or `directory/image` for loose images.
    pub fn get_pretty_current_filename(&self) -> Option<String> {
        let base = self.get_base_filename()?;
        if self.archive_type.is_some() {
            Some(base)
        } else {
            Some(format!("{}/{}", base, self.get_page_filename(None)?))
        }
    }

    fn wait_on_file(&self, path: &Path) {
        let coordinator = self.coordinator.as_deref().filter(|_| self.archive_type.is_some());
        wait_for(coordinator, &self.name_table, path);
    }

    fn wait_on_page(&self, page: Option<usize>) -> Option<PathBuf> {
        let path = self.get_path_to_page(page)?.to_path_buf();
        self.wait_on_file(&path);
        Some(path)
    }

    /// Width and height of `page`, `(0, 0)` if it cannot be read.
    pub fn get_size(&self, page: Option<usize>) -> (u32, u32) {
        self.wait_on_page(page)
            .map(|p| page::image_size(&p))
            .unwrap_or((0, 0))
    }

    pub fn get_mime_name(&self, page: Option<usize>) -> String {
        self.wait_on_page(page)
            .and_then(|p| page::mime_name(&p))
            .unwrap_or_else(|| "Unknown filetype".to_string())
    }

    /// `page` scaled to fit in `width` x `height`; the placeholder when it
    /// cannot be decoded.
    pub fn get_thumbnail(&self, page: Option<usize>, width: u32, height: u32) -> Arc<Pixbuf> {
        let Some(path) = self.wait_on_page(page) else {
            return Arc::clone(&self.placeholder);
        };
        match decode_image(&path, Some((width, height))) {
            Ok(thumb) => Arc::new(thumb),
            Err(e) => {
                log::debug!("No thumbnail for {}: {}", path.display(), e);
                Arc::clone(&self.placeholder)
            }
        }
    }

    pub fn get_stats(&self, page: Option<usize>) -> Option<fs::Metadata> {
        let path = self.wait_on_page(page)?;
        fs::metadata(path).ok()
    }

    pub fn get_number_of_comments(&self) -> usize {
        self.comment_files.len()
    }

    pub fn get_comment_name(&self, num: usize) -> Option<&Path> {
        self.comment_files.get(num.checked_sub(1)?).map(PathBuf::as_path)
    }

    /// Contents of comment `num` (from 1), or `None` if it is unreadable.
    pub fn get_comment_text(&self, num: usize) -> Option<String> {
        let path = self.get_comment_name(num)?.to_path_buf();
        self.wait_on_file(&path);
        let bytes = fs::read(&path).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for FileHandler {
    fn drop(&mut self) {
        self.extractor.stop();
    }
}

fn wait_for(coordinator: Option<&Coordinator>, name_table: &HashMap<PathBuf, String>, path: &Path) {
    let (Some(coordinator), Some(name)) = (coordinator, name_table.get(path)) else {
        return;
    };
    if coordinator.wait_until_ready(name) == WaitOutcome::Cancelled {
        log::debug!("Stopped waiting for {}: extraction cancelled", name);
    }
}

fn decode_or_placeholder(path: &Path, placeholder: Arc<Pixbuf>) -> Arc<Pixbuf> {
    match decode_image(path, None) {
        Ok(pixbuf) => Arc::new(pixbuf),
        Err(e) => {
            log::warn!("Could not load {}: {}", path.display(), e);
            placeholder
        }
    }
}

/// Archive members split by kind, images in reading order. Members whose
/// names would land outside `tmp` are dropped.
struct Members {
    images: Vec<String>,
    comments: Vec<String>,
    unknown: Vec<String>,
}

fn partition_members(members: &[String], prefs: &Preferences, tmp: &Path) -> Members {
    let mut parts = Members {
        images: Vec::new(),
        comments: Vec::new(),
        unknown: Vec::new(),
    };
    for member in members {
        if member_destination(tmp, member).is_none() {
            log::warn!("Ignoring member with unsafe path: {}", member);
        } else if is_image_name(member) {
            parts.images.push(member.clone());
        } else if prefs.is_comment_name(member) {
            parts.comments.push(member.clone());
        } else {
            parts.unknown.push(member.clone());
        }
    }
    alphanumeric_sort(&mut parts.images);
    parts
}

/// Extract a nested archive next to itself, recursing into archives found
/// inside it, then delete it. Runs one extraction at a time. Returns false
/// if the archive was left packed.
fn open_subarchive(dir: &Path, archive: &Path, depth: usize) -> bool {
    if depth > MAX_NESTING_DEPTH {
        log::warn!(
            "Not unpacking {}: nested more than {} levels deep",
            archive.display(),
            MAX_NESTING_DEPTH
        );
        return false;
    }
    let mut extractor = Extractor::new();
    let coordinator = match extractor.setup(archive, dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Cannot open nested archive {}: {}", archive.display(), e);
            return false;
        }
    };
    let mut members = extractor.get_members().to_vec();
    alphanumeric_sort(&mut members);
    extractor.set_members(members.clone());
    if let Err(e) = extractor.extract() {
        log::warn!("Cannot extract nested archive {}: {}", archive.display(), e);
        return false;
    }

    for name in &members {
        if coordinator.wait_until_ready(name) != WaitOutcome::Ready {
            break;
        }
        let Some(path) = member_destination(dir, name) else { continue };
        if archive_format(&path).is_some() {
            if let Some(parent) = path.parent() {
                open_subarchive(parent, &path, depth + 1);
            }
        }
    }
    extractor.stop();

    if let Err(e) = fs::remove_file(archive) {
        log::warn!("Could not remove {}: {}", archive.display(), e);
    }
    true
}
