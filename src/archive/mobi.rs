//! MobiPocket books, read as archives of their image records.
//!
//! A book is a PalmDB file: a 78-byte header whose record count sits at
//! offset 76, then one 8-byte entry per record starting with the record's
//! file offset. Record 0 holds the MOBI header (encryption type at 0x0C,
//! first image record at 0x6C). Every record from the first image on that
//! decodes as an image is listed as `imageNNNNN.<ext>`, numbered from 1.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::extractor::Job;
use crate::error::{ComixError, Result};

const PDB_HEADER_LEN: usize = 78;
const RECORD_ENTRY_LEN: usize = 8;
const IDENT_OFFSET: usize = 0x3C;
const CRYPTO_OFFSET: usize = 0x0C;
const FIRST_IMAGE_OFFSET: usize = 0x6C;
/// Enough of a record to recognise an image signature.
const PEEK_LEN: u64 = 32;

fn be_u16(buf: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(buf.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(buf: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(buf.get(at..at + 4)?.try_into().ok()?))
}

fn malformed(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, what.to_string())
}

struct MobiBook {
    file: File,
    /// Record start offsets, closed by the file length.
    offsets: Vec<u64>,
    first_image: usize,
}

impl MobiBook {
    fn open(path: &Path) -> Result<Self> {
        let corrupt = |e: io::Error| ComixError::corrupt(path, e);

        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut header = [0u8; PDB_HEADER_LEN];
        file.read_exact(&mut header).map_err(corrupt)?;
        if &header[IDENT_OFFSET..IDENT_OFFSET + 8] != b"BOOKMOBI" {
            return Err(ComixError::unsupported(path, "not a MobiPocket book"));
        }
        let count = be_u16(&header, 76).unwrap_or(0) as usize;
        let mut table = vec![0u8; count * RECORD_ENTRY_LEN];
        file.read_exact(&mut table).map_err(corrupt)?;

        let mut offsets: Vec<u64> = table
            .chunks_exact(RECORD_ENTRY_LEN)
            .filter_map(|entry| be_u32(entry, 0))
            .map(u64::from)
            .collect();
        offsets.push(file_len);
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(corrupt(malformed("record offsets out of order")));
        }

        let mut book = Self {
            file,
            offsets,
            first_image: 0,
        };
        let record0 = book.read_record(0, None).map_err(corrupt)?;
        let crypto = be_u16(&record0, CRYPTO_OFFSET)
            .ok_or_else(|| corrupt(malformed("short MOBI header")))?;
        if crypto != 0 {
            return Err(ComixError::unsupported(path, "encrypted book"));
        }
        book.first_image = be_u32(&record0, FIRST_IMAGE_OFFSET)
            .ok_or_else(|| corrupt(malformed("short MOBI header")))? as usize;
        Ok(book)
    }

    fn record_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn record_span(&self, record: usize) -> io::Result<(u64, u64)> {
        match (self.offsets.get(record), self.offsets.get(record + 1)) {
            (Some(&start), Some(&end)) => Ok((start, end - start)),
            _ => Err(malformed("record out of range")),
        }
    }

    fn read_record(&mut self, record: usize, limit: Option<u64>) -> io::Result<Vec<u8>> {
        let (start, len) = self.record_span(record)?;
        let len = limit.map_or(len, |limit| len.min(limit));
        self.file.seek(SeekFrom::Start(start))?;
        let mut data = Vec::with_capacity(len as usize);
        (&mut self.file).take(len).read_to_end(&mut data)?;
        Ok(data)
    }

    fn copy_record(&mut self, record: usize, out: &mut dyn io::Write) -> io::Result<()> {
        let (start, len) = self.record_span(record)?;
        self.file.seek(SeekFrom::Start(start))?;
        io::copy(&mut (&mut self.file).take(len), out)?;
        Ok(())
    }

    fn image_names(&mut self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for record in self.first_image..self.record_count() {
            let head = self.read_record(record, Some(PEEK_LEN))?;
            let Ok(format) = image::guess_format(&head) else {
                continue;
            };
            if let Some(ext) = format.extensions_str().first() {
                names.push(format!("image{:05}.{}", 1 + record - self.first_image, ext));
            }
        }
        Ok(names)
    }

    /// Record number behind a listed `imageNNNNN.<ext>` name.
    fn record_of(&self, name: &str) -> Option<usize> {
        let number: usize = name.strip_prefix("image")?.split('.').next()?.parse().ok()?;
        (number + self.first_image).checked_sub(1)
    }
}

pub(crate) fn list(path: &Path) -> Result<Vec<String>> {
    let mut book = MobiBook::open(path)?;
    book.image_names().map_err(|e| ComixError::corrupt(path, e))
}

pub(crate) fn extract(job: &Job) -> io::Result<()> {
    let mut book = MobiBook::open(&job.archive).map_err(io::Error::other)?;
    for member in &job.order {
        if job.cancelled() {
            break;
        }
        let Some(record) = book.record_of(member) else {
            job.finish(member, Err(malformed("not an image record name")));
            continue;
        };
        job.extract_with(member, |dest| {
            let mut out = File::create(dest)?;
            book.copy_record(record, &mut out)
        });
    }
    Ok(())
}
