use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Local};
use winit::keyboard::NamedKey;
use winit::window::{Fullscreen, Window};

use comix::page::Pixbuf;
use comix::{FileHandler, Pages};

use crate::ui::render::{blit_scaled, layout_pages, rgb, BG_COLOR};

/// Last message from the file handler, shown in the title until the next
/// key press.
pub type StatusLine = Rc<RefCell<Option<String>>>;

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub handler: FileHandler,
    pub status: StatusLine,

    pub show_info: bool,
    pub is_fullscreen: bool,
    needs_caching: bool,
    shown_title: String,

    // Keys that were pressed since the last frame
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,
}

impl ViewerState {
    pub fn new(handler: FileHandler, status: StatusLine) -> Self {
        Self {
            handler,
            status,
            show_info: false,
            is_fullscreen: false,
            needs_caching: false,
            shown_title: String::new(),
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
        }
    }

    fn is_key_pressed_named(&self, k: NamedKey) -> bool {
        self.keys_pressed.contains(&k)
    }

    fn is_char_pressed(&self, c: char) -> bool {
        self.chars_pressed.contains(&c)
    }

    /// True once after the page position changed.
    pub fn take_needs_caching(&mut self) -> bool {
        std::mem::take(&mut self.needs_caching)
    }

    /// Apply the keys pressed since the last frame. Returns true to quit.
    pub fn update(&mut self, window: &Window) -> bool {
        if self.is_key_pressed_named(NamedKey::Escape) || self.is_char_pressed('q') {
            return true;
        }
        if !self.keys_pressed.is_empty() || !self.chars_pressed.is_empty() {
            self.status.borrow_mut().take();
        }

        // ------------------------------------------------------------------
        // Navigation (arrows follow reading direction)
        // ------------------------------------------------------------------
        let manga = self.handler.preferences().manga_mode;
        let (fwd_arrow, bwd_arrow) = if manga {
            (NamedKey::ArrowLeft, NamedKey::ArrowRight)
        } else {
            (NamedKey::ArrowRight, NamedKey::ArrowLeft)
        };
        let fwd = self.is_key_pressed_named(fwd_arrow)
            || self.is_key_pressed_named(NamedKey::Space)
            || self.is_key_pressed_named(NamedKey::PageDown);
        let bwd = self.is_key_pressed_named(bwd_arrow)
            || self.is_key_pressed_named(NamedKey::PageUp)
            || self.is_key_pressed_named(NamedKey::Backspace);

        if self.is_key_pressed_named(NamedKey::Home) {
            self.handler.first_page();
            self.needs_caching = true;
        } else if self.is_key_pressed_named(NamedKey::End) {
            self.handler.last_page();
            self.needs_caching = true;
        } else if fwd {
            // At the end this may have opened the next archive instead.
            self.handler.next_page();
            self.needs_caching = true;
        } else if bwd {
            self.handler.previous_page();
            self.needs_caching = true;
        }

        if self.is_char_pressed('o') {
            self.needs_caching |= self.handler.open_next_archive();
        }
        if self.is_char_pressed('O') {
            self.needs_caching |= self.handler.open_previous_archive();
        }

        // ------------------------------------------------------------------
        // View toggles
        // ------------------------------------------------------------------
        let mut prefs = self.handler.preferences().clone();
        if self.is_char_pressed('d') {
            prefs.double_page = !prefs.double_page;
        }
        if self.is_char_pressed('m') {
            prefs.manga_mode = !prefs.manga_mode;
        }
        if self.is_char_pressed('w') {
            prefs.no_double_page_for_wide_images = !prefs.no_double_page_for_wide_images;
        }
        if &prefs != self.handler.preferences() {
            log::debug!(
                "[view] double={} manga={} wide-single={}",
                prefs.double_page,
                prefs.manga_mode,
                prefs.no_double_page_for_wide_images
            );
            self.handler.set_preferences(prefs);
            self.needs_caching = true;
        }

        if self.is_char_pressed('i') {
            self.show_info = !self.show_info;
        }
        if self.is_char_pressed('c') {
            self.print_comments();
        }
        if self.is_char_pressed('f') {
            self.is_fullscreen = !self.is_fullscreen;
            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
        }

        self.keys_pressed.clear();
        self.chars_pressed.clear();
        false
    }

    /// Push the title to the window if it changed. Called after `render`,
    /// which settles whether a spread is shown.
    pub fn refresh_title(&mut self, window: &Window) {
        let title = self.title();
        if title != self.shown_title {
            window.set_title(&title);
            self.shown_title = title;
        }
    }

    fn print_comments(&self) {
        let count = self.handler.get_number_of_comments();
        if count == 0 {
            *self.status.borrow_mut() = Some("No comments in this file".to_string());
            return;
        }
        for num in 1..=count {
            if let Some(name) = self.handler.get_comment_name(num) {
                println!("==> {} <==", name.display());
            }
            match self.handler.get_comment_text(num) {
                Some(text) => println!("{}", text),
                None => println!("(unreadable)"),
            }
        }
    }

    /// Window title: the pending status message, or the file name and page
    /// position (plus size, type and date with the info toggle).
    pub fn title(&self) -> String {
        if let Some(message) = self.status.borrow().as_deref() {
            return format!("comix - {}", message);
        }
        let Some(name) = self.handler.get_pretty_current_filename() else {
            return "comix".to_string();
        };
        let current = self.handler.get_current_page();
        let total = self.handler.get_number_of_pages();
        let position = if self.handler.displayed_double() {
            format!("{}-{}/{}", current, current + 1, total)
        } else {
            format!("{}/{}", current, total)
        };
        if !self.show_info {
            return format!("{} [{}] - comix", name, position);
        }

        let (w, h) = self.handler.get_size(None);
        let mime = self.handler.get_mime_name(None);
        let stats = self.handler.get_stats(None);
        let kb = stats.as_ref().map(|m| m.len() as f64 / 1024.0).unwrap_or(0.0);
        let modified = stats
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        format!(
            "{} [{}] {}x{} {} {:.1} KB {} - comix",
            name, position, w, h, mime, kb, modified
        )
    }

    /// Draw the current page or spread fitted into the window.
    pub fn render(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        frame.fill(rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]));

        let pages: Vec<Arc<Pixbuf>> = match self.handler.get_pixbufs(false) {
            None => return,
            Some(Pages::Single(p)) => vec![p],
            Some(Pages::Double(left, right)) if self.handler.preferences().manga_mode => {
                vec![right, left]
            }
            Some(Pages::Double(left, right)) => vec![left, right],
        };

        let sizes: Vec<(u32, u32)> = pages.iter().map(|p| (p.width, p.height)).collect();
        let placements = layout_pages(&sizes, fb_w as f32, fb_h as f32);
        for (page, at) in pages.iter().zip(placements) {
            blit_scaled(
                frame, fb_w, fb_h,
                &page.rgba_bytes, page.width, page.height,
                at,
            );
        }
    }
}
