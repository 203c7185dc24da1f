use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

use image::{ImageFormat, RgbaImage};
use zip::write::SimpleFileOptions;

use comix::archive::{ArchiveFormat, Extractor, Ticket, WaitOutcome};
use comix::{FileHandler, Pages, Preferences};

const MEMBERS: usize = 24;
const MEMBER_LEN: usize = 128 * 1024;

fn png(w: u32, h: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::new(w, h)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Incompressible filler so every member costs real work to extract.
fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x as u8
        })
        .collect()
}

fn noisy_members() -> Vec<(String, Vec<u8>)> {
    (0..MEMBERS)
        .map(|i| (format!("{:02}.bin", i), noise(MEMBER_LEN, i as u64 + 1)))
        .collect()
}

fn page_members(count: usize) -> Vec<(String, Vec<u8>)> {
    (1..=count)
        .map(|i| (format!("page{}.png", i), png(4 + i as u32, 6)))
        .collect()
}

fn write_zip(path: &Path, members: &[(String, Vec<u8>)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in members {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

fn zip_bytes(members: &[(String, Vec<u8>)]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inner.zip");
    write_zip(&path, members);
    fs::read(path).unwrap()
}

fn tar_into<W: Write>(out: W, members: &[(String, Vec<u8>)]) -> W {
    let mut builder = tar::Builder::new(out);
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

fn write_archive(path: &Path, format: ArchiveFormat, members: &[(String, Vec<u8>)]) {
    match format {
        ArchiveFormat::Zip => write_zip(path, members),
        ArchiveFormat::Tar => {
            tar_into(File::create(path).unwrap(), members);
        }
        ArchiveFormat::TarGz => {
            let gz = flate2::write::GzEncoder::new(
                File::create(path).unwrap(),
                flate2::Compression::fast(),
            );
            tar_into(gz, members).finish().unwrap();
        }
        ArchiveFormat::TarBz2 => {
            let bz = bzip2::write::BzEncoder::new(
                File::create(path).unwrap(),
                bzip2::Compression::fast(),
            );
            tar_into(bz, members).finish().unwrap();
        }
        ArchiveFormat::SevenZip => {
            let staging = tempfile::tempdir().unwrap();
            for (name, data) in members {
                fs::write(staging.path().join(name), data).unwrap();
            }
            sevenz_rust::compress_to_path(staging.path(), path).unwrap();
        }
        other => panic!("no writer for {:?}", other),
    }
}

/// Reverse the archive's own member order, wait for the member now due
/// first, then stop. The member stored first in the archive is due last and
/// must not have been reached.
fn extraction_follows_member_order(format: ArchiveFormat) {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("noise.bin");
    write_archive(&archive, format, &noisy_members());
    let out = tempfile::tempdir().unwrap();

    let mut extractor = Extractor::new();
    let handle = extractor.setup(&archive, out.path()).unwrap();
    assert_eq!(extractor.format(), Some(format));
    let mut order = extractor.get_members().to_vec();
    assert_eq!(order.len(), MEMBERS);
    let stored_first = order[0].clone();
    order.reverse();
    let due_first = order[0].clone();
    extractor.set_members(order);
    extractor.extract().unwrap();

    assert_eq!(
        handle.wait_until_ready_timeout(&due_first, Duration::from_secs(60)),
        Some(WaitOutcome::Ready)
    );
    extractor.stop();

    assert_ne!(handle.ticket(&stored_first), Some(Ticket::Ready));
    assert!(!out.path().join(&stored_first).exists());
    let written = fs::read(out.path().join(&due_first)).unwrap();
    assert_eq!(written.len(), MEMBER_LEN);
}

#[test]
fn zip_follows_member_order() {
    extraction_follows_member_order(ArchiveFormat::Zip);
}

#[test]
fn tar_follows_member_order() {
    extraction_follows_member_order(ArchiveFormat::Tar);
}

#[test]
fn gzip_tar_follows_member_order() {
    extraction_follows_member_order(ArchiveFormat::TarGz);
}

#[test]
fn bzip2_tar_follows_member_order() {
    extraction_follows_member_order(ArchiveFormat::TarBz2);
}

#[test]
fn sevenzip_follows_member_order() {
    extraction_follows_member_order(ArchiveFormat::SevenZip);
}

#[test]
fn streamed_formats_extract_every_member_in_any_order() {
    for format in [ArchiveFormat::TarGz, ArchiveFormat::SevenZip] {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pages");
        let members = page_members(6);
        write_archive(&archive, format, &members);
        let out = tempfile::tempdir().unwrap();

        let mut extractor = Extractor::new();
        let handle = extractor.setup(&archive, out.path()).unwrap();
        // Middle first, as when a book is opened part way through.
        let order: Vec<String> = ["page4.png", "page5.png", "page3.png", "page1.png", "page2.png", "page6.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        extractor.set_members(order.clone());
        extractor.extract().unwrap();
        for name in &order {
            assert_eq!(handle.wait_until_ready(name), WaitOutcome::Ready);
        }
        extractor.stop();

        for (name, data) in &members {
            assert_eq!(&fs::read(out.path().join(name)).unwrap(), data, "{:?} {}", format, name);
        }
    }
}

#[test]
fn member_order_is_fixed_once_extraction_starts() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("pages.cbz");
    write_archive(&archive, ArchiveFormat::Zip, &page_members(3));
    let out = tempfile::tempdir().unwrap();

    let mut extractor = Extractor::new();
    let handle = extractor.setup(&archive, out.path()).unwrap();
    extractor.set_members(vec!["page1.png".to_string(), "page2.png".to_string()]);
    extractor.extract().unwrap();
    assert_eq!(handle.wait_until_ready("page2.png"), WaitOutcome::Ready);

    extractor.set_members(vec!["page3.png".to_string()]);
    assert_eq!(handle.tracked(), 2);
    assert_eq!(handle.ticket("page1.png"), Some(Ticket::Ready));
    assert_eq!(handle.wait_until_ready("page3.png"), WaitOutcome::Untracked);
    extractor.stop();
    assert!(!out.path().join("page3.png").exists());
}

fn open_round_trip(format: ArchiveFormat, file_name: &str) {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join(file_name);
    write_archive(&archive, format, &page_members(5));

    let prefs = Preferences {
        auto_open_next_archive: false,
        ..Preferences::default()
    };
    let mut fh = FileHandler::new(prefs).unwrap();
    assert!(fh.open_file(&archive, 4));
    assert_eq!(fh.archive_format(), Some(format));
    assert_eq!(fh.get_number_of_pages(), 5);
    assert_eq!(fh.get_current_page(), 4);
    match fh.get_pixbufs(false) {
        Some(Pages::Single(p)) => assert_eq!((p.width, p.height, p.is_placeholder), (8, 6, false)),
        other => panic!("unexpected pages: {:?}", other),
    }
    assert!(fh.first_page());
    assert_eq!(fh.get_size(None), (5, 6));
    assert_eq!(fh.get_page_filename(Some(5)).as_deref(), Some("page5.png"));
}

#[test]
fn gzip_tar_books_open() {
    open_round_trip(ArchiveFormat::TarGz, "book.cbt.gz");
}

#[test]
fn bzip2_tar_books_open() {
    open_round_trip(ArchiveFormat::TarBz2, "book.cbt.bz2");
}

#[test]
fn sevenzip_books_open() {
    open_round_trip(ArchiveFormat::SevenZip, "book.cb7");
}

#[test]
fn nesting_stops_at_the_depth_cap() {
    // lvl1.zip holds p1.png; every lvlN.zip holds pN.png and lvl(N-1).zip.
    let mut inner: Vec<(String, Vec<u8>)> = vec![("p1.png".to_string(), png(4, 6))];
    for level in 2..=10 {
        let packed = zip_bytes(&inner);
        inner = vec![
            (format!("p{}.png", level), png(4, 6)),
            (format!("lvl{}.zip", level - 1), packed),
        ];
    }
    let dir = tempfile::tempdir().unwrap();
    let cbz = dir.path().join("deep.cbz");
    write_zip(
        &cbz,
        &[
            ("cover.png".to_string(), png(4, 6)),
            ("lvl10.zip".to_string(), zip_bytes(&inner)),
        ],
    );

    let mut fh = FileHandler::new(Preferences::default()).unwrap();
    assert!(fh.open_file(&cbz, 1));
    let names: Vec<String> = (1..=fh.get_number_of_pages())
        .map(|p| fh.get_page_filename(Some(p)).unwrap())
        .collect();
    let mut expected = vec!["cover.png".to_string()];
    expected.extend((3..=10).map(|n| format!("p{}.png", n)));
    assert_eq!(names, expected);

    let tmp = fh.get_path_to_page(Some(1)).unwrap().parent().unwrap().to_path_buf();
    assert!(tmp.join("lvl2.zip").is_file());
    assert!(!tmp.join("lvl3.zip").exists());
    assert!(!tmp.join("p2.png").exists());
}

// ---------------------------------------------------------------------------
// MobiPocket
// ---------------------------------------------------------------------------

/// A PalmDB file with `records` laid out back to back after the record
/// table.
fn palm_db(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0u8; 78];
    out[..8].copy_from_slice(b"testbook");
    out[60..68].copy_from_slice(b"BOOKMOBI");
    out[76..78].copy_from_slice(&(records.len() as u16).to_be_bytes());

    let mut offset = 78 + records.len() * 8 + 2;
    for (i, record) in records.iter().enumerate() {
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(i as u32).to_be_bytes());
        offset += record.len();
    }
    out.extend_from_slice(&[0, 0]);
    for record in records {
        out.extend_from_slice(record);
    }
    out
}

fn mobi_header(crypto: u16, first_image: u32) -> Vec<u8> {
    let mut record = vec![0u8; 0x100];
    record[0x0C..0x0E].copy_from_slice(&crypto.to_be_bytes());
    record[0x10..0x14].copy_from_slice(b"MOBI");
    record[0x6C..0x70].copy_from_slice(&first_image.to_be_bytes());
    record
}

#[test]
fn mobipocket_images_are_pages() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("novel.mobi");
    fs::write(
        &book,
        palm_db(&[
            mobi_header(0, 2),
            b"<html>chapter one</html>".to_vec(),
            png(7, 9),
            b"FLIS\x00\x00\x00\x08 not a picture".to_vec(),
            png(3, 5),
        ]),
    )
    .unwrap();

    let mut fh = FileHandler::new(Preferences::default()).unwrap();
    assert!(fh.open_file(&book, 1));
    assert_eq!(fh.archive_format(), Some(ArchiveFormat::Mobi));
    let names: Vec<String> = (1..=fh.get_number_of_pages())
        .map(|p| fh.get_page_filename(Some(p)).unwrap())
        .collect();
    assert_eq!(names, vec!["image00001.png", "image00003.png"]);
    assert_eq!(fh.get_size(Some(1)), (7, 9));
    assert_eq!(fh.get_size(Some(2)), (3, 5));
    assert_eq!(fh.get_mime_name(Some(2)), "PNG");
}

#[test]
fn encrypted_mobipocket_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("locked.mobi");
    fs::write(&book, palm_db(&[mobi_header(2, 1), png(4, 4)])).unwrap();

    let mut extractor = Extractor::new();
    let out = tempfile::tempdir().unwrap();
    match extractor.setup(&book, out.path()) {
        Err(err) => assert!(err.to_string().contains("encrypted"), "{}", err),
        Ok(_) => panic!("encrypted book was accepted"),
    }
}

#[test]
fn mobipocket_follows_member_order() {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("noise.mobi");
    let mut records = vec![mobi_header(0, 1)];
    for i in 0..MEMBERS {
        let mut record = png(2, 2);
        record.extend(noise(MEMBER_LEN, i as u64 + 1));
        records.push(record);
    }
    fs::write(&book, palm_db(&records)).unwrap();
    let out = tempfile::tempdir().unwrap();

    let mut extractor = Extractor::new();
    let handle = extractor.setup(&book, out.path()).unwrap();
    let mut order = extractor.get_members().to_vec();
    assert_eq!(order.len(), MEMBERS);
    assert_eq!(order[0], "image00001.png");
    order.reverse();
    extractor.set_members(order);
    extractor.extract().unwrap();

    assert_eq!(
        handle.wait_until_ready_timeout("image00024.png", Duration::from_secs(60)),
        Some(WaitOutcome::Ready)
    );
    extractor.stop();
    assert_ne!(handle.ticket("image00001.png"), Some(Ticket::Ready));
    assert!(!out.path().join("image00001.png").exists());
}
