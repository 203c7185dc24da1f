use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::archive::coordinator::{Coordinator, WaitHandle};
use crate::archive::{formats, list_members, mobi, ArchiveFormat};
use crate::error::{ComixError, Result};
use crate::files::member_destination;

// ---------------------------------------------------------------------------
// Extraction job (what the background thread works on)
// ---------------------------------------------------------------------------

pub(crate) struct Job {
    pub archive: PathBuf,
    pub format: ArchiveFormat,
    pub dest: PathBuf,
    pub order: Vec<String>,
    coordinator: WaitHandle,
    stop: Arc<AtomicBool>,
}

impl Job {
    pub fn new(
        archive: PathBuf,
        format: ArchiveFormat,
        dest: PathBuf,
        order: Vec<String>,
        coordinator: WaitHandle,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            archive,
            format,
            dest,
            order,
            coordinator,
            stop,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Mark `member` as in flight and return where it should be written.
    /// Unsafe names are released straight away and yield `None`.
    pub fn begin(&self, member: &str) -> Option<PathBuf> {
        self.coordinator.mark_extracting(member);
        match member_destination(&self.dest, member) {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        log::warn!("Cannot create {}: {}", parent.display(), e);
                    }
                }
                Some(path)
            }
            None => {
                log::warn!("Skipping member with unsafe path: {}", member);
                self.coordinator.mark_ready(member);
                None
            }
        }
    }

    /// Release `member` to waiters whether or not it was written.
    pub fn finish(&self, member: &str, result: io::Result<()>) {
        match result {
            Ok(()) => log::debug!("Extracted {}", member),
            Err(e) => log::warn!("Failed to extract {}: {}", member, e),
        }
        self.coordinator.mark_ready(member);
    }

    pub fn extract_with<F>(&self, member: &str, write: F)
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        if let Some(path) = self.begin(member) {
            let result = write(&path);
            self.finish(member, result);
        }
    }

    pub fn write_member(&self, member: &str, reader: &mut dyn Read) {
        self.extract_with(member, |path| {
            let mut out = File::create(path)?;
            io::copy(reader, &mut out)?;
            Ok(())
        });
    }
}

fn run_job(job: Job) {
    let start_time = Instant::now();
    let result = match job.format {
        ArchiveFormat::Zip => formats::extract_zip(&job),
        ArchiveFormat::Tar | ArchiveFormat::TarGz | ArchiveFormat::TarBz2 => {
            formats::extract_tar(&job)
        }
        ArchiveFormat::SevenZip => formats::extract_7z(&job),
        ArchiveFormat::Rar => formats::extract_rar(&job),
        ArchiveFormat::Mobi => mobi::extract(&job),
    };

    if job.cancelled() {
        log::debug!("Extraction of {} stopped", job.archive.display());
        return;
    }
    if let Err(e) = result {
        log::warn!("Extraction of {} aborted: {}", job.archive.display(), e);
    }
    job.coordinator.finish();
    log::info!(
        "Extracted {} members of {} in {:.2}s",
        job.order.len(),
        job.archive.display(),
        start_time.elapsed().as_secs_f64()
    );
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

struct Session {
    archive: PathBuf,
    format: ArchiveFormat,
    dest: PathBuf,
    members: Vec<String>,
    order: Vec<String>,
    coordinator: WaitHandle,
}

/// Pulls members out of one archive into a directory on a background thread.
///
/// Usage is `setup`, then `set_members`, then `extract`; `stop` (also run on
/// drop) cancels and joins the thread.
#[derive(Default)]
pub struct Extractor {
    session: Option<Session>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `archive` and list its members. Nothing is extracted yet.
    pub fn setup(&mut self, archive: &Path, dest: &Path) -> Result<WaitHandle> {
        self.stop();
        self.session = None;

        let format = ArchiveFormat::sniff(archive)?
            .ok_or_else(|| ComixError::unsupported(archive, "unrecognised signature"))?;
        let members = list_members(archive, format)?;
        log::debug!(
            "{}: {} archive with {} members",
            archive.display(),
            format.name(),
            members.len()
        );

        let coordinator: WaitHandle = Arc::new(Coordinator::new());
        self.stop = Arc::new(AtomicBool::new(false));
        self.session = Some(Session {
            archive: archive.to_path_buf(),
            format,
            dest: dest.to_path_buf(),
            members,
            order: Vec::new(),
            coordinator: Arc::clone(&coordinator),
        });
        Ok(coordinator)
    }

    pub fn format(&self) -> Option<ArchiveFormat> {
        self.session.as_ref().map(|s| s.format)
    }

    pub fn get_members(&self) -> &[String] {
        self.session.as_ref().map(|s| s.members.as_slice()).unwrap_or(&[])
    }

    /// Members to extract, in the order they should be extracted. Ignored
    /// once `extract` has started.
    pub fn set_members(&mut self, ordered: Vec<String>) {
        if self.worker.is_some() {
            log::warn!("Extraction already started; new member order ignored");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.coordinator.track(ordered.iter().cloned());
            session.order = ordered;
        }
    }

    /// Declare `names` (relative to the destination) as already on disk.
    pub fn set_members_extracted(&mut self, names: Vec<String>) {
        if let Some(session) = self.session.as_mut() {
            session.coordinator.track_ready(names.iter().cloned());
            session.order = Vec::new();
        }
    }

    /// Start extracting on a background thread and return immediately.
    pub fn extract(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        if self.worker.is_some() {
            log::debug!("Extraction of {} already started", session.archive.display());
            return Ok(());
        }
        if session.order.is_empty() {
            return Ok(());
        }

        let job = Job::new(
            session.archive.clone(),
            session.format,
            session.dest.clone(),
            session.order.clone(),
            Arc::clone(&session.coordinator),
            Arc::clone(&self.stop),
        );
        let handle = thread::Builder::new()
            .name("comix-extract".into())
            .spawn(move || run_job(job))?;
        self.worker = Some(handle);
        Ok(())
    }

    pub fn is_ready(&self, member: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.coordinator.is_ready(member))
    }

    pub fn wait_handle(&self) -> Option<WaitHandle> {
        self.session.as_ref().map(|s| Arc::clone(&s.coordinator))
    }

    /// Cancel any running extraction and wait for the thread to exit.
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(session) = self.session.as_ref() {
            session.coordinator.cancel();
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Extraction thread panicked");
            }
        }
    }
}

impl Drop for Extractor {
    fn drop(&mut self) {
        self.stop();
    }
}
