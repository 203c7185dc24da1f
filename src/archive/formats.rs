//! Per-format listing and extraction.
//!
//! Every back-end extracts members in `Job::order`. Zip, plain tar and
//! MobiPocket seek straight to each member. The compressed tars, 7z and RAR
//! can only be read front to back, so they go through `InOrder`, which
//! reopens the archive whenever the next member lies behind the read
//! position.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::extractor::Job;
use crate::archive::ArchiveFormat;
use crate::error::{ComixError, Result};

fn not_in_archive(member: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found in archive", member))
}

// ---------------------------------------------------------------------------
// Front-to-back walk in priority order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Keep reading this pass.
    Continue,
    /// The next member is behind the read position.
    Reopen,
    /// Nothing left to do (or cancelled).
    Done,
}

/// Cursor into `Job::order` for formats without random access. One pass
/// reads the archive from the start; entries before the next wanted member
/// are skipped.
pub(crate) struct InOrder<'a> {
    job: &'a Job,
    next: usize,
    /// Names read so far in the current pass.
    passed: HashSet<String>,
    passes: usize,
}

impl<'a> InOrder<'a> {
    pub fn new(job: &'a Job) -> Self {
        Self {
            job,
            next: 0,
            passed: HashSet::new(),
            passes: 0,
        }
    }

    fn target(&self) -> Option<&'a str> {
        let job: &'a Job = self.job;
        job.order.get(self.next).map(String::as_str)
    }

    /// True if the entry `name` is the member to extract right now.
    pub fn wants_now(&self, name: &str) -> bool {
        !self.job.cancelled() && self.target() == Some(name)
    }

    /// Record that the entry `name` has been read (extracted or skipped).
    pub fn advance(&mut self, name: &str) -> Step {
        if self.target() == Some(name) {
            self.next += 1;
        }
        self.passed.insert(name.to_string());
        match self.target() {
            _ if self.job.cancelled() => Step::Done,
            None => Step::Done,
            Some(t) if self.passed.contains(t) => Step::Reopen,
            Some(_) => Step::Continue,
        }
    }

    /// Extract `name` from `data` if it is due, otherwise read past it.
    pub fn visit(&mut self, name: &str, data: &mut dyn Read) -> io::Result<Step> {
        if self.wants_now(name) {
            self.job.write_member(name, data);
        } else {
            io::copy(data, &mut io::sink())?;
        }
        Ok(self.advance(name))
    }

    /// Run `pass` (which reads the archive from the start, calling `visit`
    /// or `wants_now`/`advance` per entry) until every member is handled.
    pub fn run<F>(mut self, mut pass: F) -> io::Result<()>
    where
        F: FnMut(&mut Self) -> io::Result<()>,
    {
        while self.target().is_some() && !self.job.cancelled() {
            self.passes += 1;
            self.passed.clear();
            pass(&mut self)?;
            self.end_pass();
        }
        log::debug!(
            "{}: {} members in {} passes",
            self.job.archive.display(),
            self.next,
            self.passes
        );
        Ok(())
    }

    /// Members that were due but never met in a full pass are not in the
    /// archive; release them.
    fn end_pass(&mut self) {
        if self.job.cancelled() {
            return;
        }
        while let Some(target) = self.target() {
            if self.passed.contains(target) {
                break;
            }
            self.job.finish(target, Err(not_in_archive(target)));
            self.next += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Zip
// ---------------------------------------------------------------------------

pub(crate) fn list_zip(path: &Path) -> io::Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?).map_err(io::Error::other)?;
    let mut members = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(io::Error::other)?;
        if !file.is_dir() {
            members.push(file.name().to_string());
        }
    }
    Ok(members)
}

pub(crate) fn extract_zip(job: &Job) -> io::Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(&job.archive)?).map_err(io::Error::other)?;
    for member in &job.order {
        if job.cancelled() {
            break;
        }
        job.extract_with(member, |dest| {
            let mut entry = archive.by_name(member).map_err(io::Error::other)?;
            let mut out = File::create(dest)?;
            io::copy(&mut entry, &mut out)?;
            Ok(())
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tar family
// ---------------------------------------------------------------------------

fn tar_reader(path: &Path, format: ArchiveFormat) -> io::Result<tar::Archive<Box<dyn Read>>> {
    let reader = BufReader::new(File::open(path)?);
    let stream: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(reader)),
        ArchiveFormat::TarBz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        _ => Box::new(reader),
    };
    Ok(tar::Archive::new(stream))
}

fn tar_entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn is_tar_file<R: Read>(entry: &tar::Entry<'_, R>) -> bool {
    let kind = entry.header().entry_type();
    kind.is_file() || kind.is_contiguous()
}

pub(crate) fn list_tar(path: &Path, format: ArchiveFormat) -> io::Result<Vec<String>> {
    let mut archive = tar_reader(path, format)?;
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if is_tar_file(&entry) {
            members.push(tar_entry_name(&entry));
        }
    }
    Ok(members)
}

/// Data offset and size of every file in an uncompressed tar. Only the
/// headers are read.
fn index_tar(path: &Path) -> io::Result<HashMap<String, (u64, u64)>> {
    let mut archive = tar::Archive::new(BufReader::new(File::open(path)?));
    let mut index = HashMap::new();
    for entry in archive.entries_with_seek()? {
        let entry = entry?;
        if is_tar_file(&entry) {
            index
                .entry(tar_entry_name(&entry))
                .or_insert((entry.raw_file_position(), entry.size()));
        }
    }
    Ok(index)
}

fn extract_plain_tar(job: &Job) -> io::Result<()> {
    let index = index_tar(&job.archive)?;
    let mut file = File::open(&job.archive)?;
    for member in &job.order {
        if job.cancelled() {
            break;
        }
        let Some(&(offset, size)) = index.get(member) else {
            job.finish(member, Err(not_in_archive(member)));
            continue;
        };
        job.extract_with(member, |dest| {
            file.seek(SeekFrom::Start(offset))?;
            let mut out = File::create(dest)?;
            io::copy(&mut (&mut file).take(size), &mut out)?;
            Ok(())
        });
    }
    Ok(())
}

pub(crate) fn extract_tar(job: &Job) -> io::Result<()> {
    if job.format == ArchiveFormat::Tar {
        return extract_plain_tar(job);
    }
    InOrder::new(job).run(|walk| {
        let mut archive = tar_reader(&job.archive, job.format)?;
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !is_tar_file(&entry) {
                continue;
            }
            let name = tar_entry_name(&entry);
            if walk.visit(&name, &mut entry)? != Step::Continue {
                break;
            }
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// 7z
// ---------------------------------------------------------------------------

fn open_7z(path: &Path) -> io::Result<sevenz_rust::SevenZReader<File>> {
    sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
        .map_err(|e| io::Error::other(e.to_string()))
}

pub(crate) fn list_7z(path: &Path) -> io::Result<Vec<String>> {
    let reader = open_7z(path)?;
    Ok(reader
        .archive()
        .files
        .iter()
        .filter(|entry| !entry.is_directory())
        .map(|entry| entry.name().to_string())
        .collect())
}

pub(crate) fn extract_7z(job: &Job) -> io::Result<()> {
    InOrder::new(job).run(|walk| {
        let mut reader = open_7z(&job.archive)?;
        reader
            .for_each_entries(|entry, data| {
                if entry.is_directory() {
                    return Ok(true);
                }
                let name = entry.name().to_string();
                Ok(walk.visit(&name, data)? == Step::Continue)
            })
            .map_err(|e| io::Error::other(e.to_string()))
    })
}

// ---------------------------------------------------------------------------
// RAR (needs the `rar` feature, which links the unrar library)
// ---------------------------------------------------------------------------

#[cfg(feature = "rar")]
pub(crate) fn list_rar(path: &Path) -> Result<Vec<String>> {
    let archive = unrar::Archive::new(path)
        .open_for_listing()
        .map_err(|e| ComixError::corrupt(path, e))?;
    let mut members = Vec::new();
    for header in archive {
        let header = header.map_err(|e| ComixError::corrupt(path, e))?;
        if !header.is_directory() {
            members.push(header.filename.to_string_lossy().into_owned());
        }
    }
    Ok(members)
}

#[cfg(not(feature = "rar"))]
pub(crate) fn list_rar(path: &Path) -> Result<Vec<String>> {
    Err(ComixError::unsupported(path, "built without RAR support"))
}

#[cfg(feature = "rar")]
pub(crate) fn extract_rar(job: &Job) -> io::Result<()> {
    InOrder::new(job).run(|walk| {
        let mut archive = unrar::Archive::new(&job.archive)
            .open_for_processing()
            .map_err(io::Error::other)?;
        loop {
            let Some(header) = archive.read_header().map_err(io::Error::other)? else {
                return Ok(());
            };
            let name = header.entry().filename.to_string_lossy().into_owned();
            if header.entry().is_directory() {
                archive = header.skip().map_err(io::Error::other)?;
                continue;
            }
            let dest = if walk.wants_now(&name) { job.begin(&name) } else { None };
            archive = match dest {
                Some(dest) => match header.extract_to(&dest) {
                    Ok(next) => {
                        job.finish(&name, Ok(()));
                        next
                    }
                    Err(e) => {
                        job.finish(&name, Err(io::Error::other(e.to_string())));
                        return Err(io::Error::other(format!("RAR stream broken at {}", name)));
                    }
                },
                None => header.skip().map_err(io::Error::other)?,
            };
            if walk.advance(&name) != Step::Continue {
                return Ok(());
            }
        }
    })
}

#[cfg(not(feature = "rar"))]
pub(crate) fn extract_rar(_job: &Job) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "built without RAR support"))
}
