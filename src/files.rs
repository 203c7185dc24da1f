use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tempfile::TempDir;

use crate::sort::alphanumeric_sort;

/// Extensions of the formats the `image` crate decodes for us.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tga", "tiff", "tif", "webp", "ico", "pnm", "pbm",
    "pgm", "ppm", "pam", "dds", "hdr", "exr", "ff", "qoi",
];

const TEMP_PREFIX: &str = "comix.";

/// True if `name` (a path or an archive member name) ends in an image
/// extension. Trailing whitespace is ignored.
pub fn is_image_name(name: &str) -> bool {
    let name = name.trim_end();
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_image_file(path: &Path) -> bool {
    path.is_file() && is_image_name(&path.to_string_lossy())
}

/// Entry names of `dir` in natural order.
pub fn list_dir_sorted(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    alphanumeric_sort(&mut names);
    Ok(names)
}

/// Image files directly inside `dir`, natural-sorted.
pub fn scan_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let images = list_dir_sorted(dir)?
        .into_iter()
        .map(|name| dir.join(name))
        .filter(|p| is_image_file(p))
        .collect();
    Ok(images)
}

/// Every regular file below `dir`, as paths relative to `dir` joined with `/`.
pub fn collect_files_relative(dir: &Path) -> io::Result<Vec<String>> {
    let mut out = Vec::new();
    collect_into(dir, String::new(), &mut out)?;
    Ok(out)
}

fn collect_into(dir: &Path, prefix: String, dest: &mut Vec<String>) -> io::Result<()> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let Ok(ft) = entry.file_type() else { continue };
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
        if ft.is_dir() {
            subdirs.push((entry.path(), rel));
        } else if ft.is_file() {
            dest.push(rel);
        }
    }
    for (path, rel) in subdirs {
        collect_into(&path, rel, dest)?;
    }
    Ok(())
}

/// Name a nested member gets once it is moved to the top of the temp dir.
pub fn flattened_name(relative: &str) -> String {
    relative.replace(['/', '\\'], "_")
}

/// Join an archive member name onto `dest`, refusing names that would land
/// outside of it.
pub fn member_destination(dest: &Path, member: &str) -> Option<PathBuf> {
    let rel = Path::new(member);
    let mut out = dest.to_path_buf();
    let mut depth = 0usize;
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(out)
}

pub fn new_temp_dir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()
}

/// Remove a temp dir tree on its own thread so large trees do not stall the
/// caller. The handle may be dropped.
pub fn delete_in_background(dir: TempDir) -> JoinHandle<()> {
    thread::spawn(move || {
        let start_time = Instant::now();
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => log::debug!(
                "Removed {} in {:.2}s",
                path.display(),
                start_time.elapsed().as_secs_f64()
            ),
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    })
}
