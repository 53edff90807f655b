//! Zip bundles of directory trees.
//!
//! Entry modification times are kept in both directions so that a tree
//! merge over extracted bundles compares real edit times. Zip stores
//! times without a zone at two-second resolution; they are read and
//! written as UTC.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ArchiveError, ArchiveResult};

/// Unpack `bundle` into `dest`, returning the number of files written.
///
/// Entries whose names are absolute or contain `..` are rejected before
/// anything outside `dest` is touched.
pub fn extract(bundle: &Path, dest: &Path) -> ArchiveResult<usize> {
    let mut archive = ZipArchive::new(File::open(bundle)?)?;
    fs::create_dir_all(dest)?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        if let Some(modified) = entry.last_modified().and_then(from_zip_time) {
            out.set_modified(modified)?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
        files += 1;
    }

    debug!(bundle = %bundle.display(), dest = %dest.display(), files, "extracted bundle");
    Ok(files)
}

/// Zip every regular file under `dir` into `bundle`, returning the number
/// of files packed.
///
/// Entry names are relative to `dir` with `/` separators. An existing file
/// at `bundle` is replaced.
pub fn pack(dir: &Path, bundle: &Path) -> ArchiveResult<usize> {
    if let Some(parent) = bundle.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(bundle)?);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for item in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let item = item?;
        if !item.file_type().is_file() {
            continue;
        }
        let name = entry_name(dir, item.path())?;
        let meta = item.metadata()?;

        let mut options = base.last_modified_time(to_zip_time(meta.modified()?));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(meta.permissions().mode());
        }

        writer.start_file(name, options)?;
        io::copy(&mut File::open(item.path())?, &mut writer)?;
        files += 1;
    }
    writer.finish()?;

    info!(dir = %dir.display(), bundle = %bundle.display(), files, "packed bundle");
    Ok(files)
}

fn entry_name(root: &Path, path: &Path) -> ArchiveResult<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ArchiveError::UnsafeEntry(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Times outside the zip range (1980..=2107) fall back to 1980-01-01.
fn to_zip_time(time: SystemTime) -> zip::DateTime {
    let dt: DateTime<Utc> = time.into();
    let Ok(year) = u16::try_from(dt.year()) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        year,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .unwrap_or_default()
}

fn from_zip_time(time: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(time.year().into(), time.month().into(), time.day().into())?;
    let dt = date.and_hms_opt(time.hour().into(), time.minute().into(), time.second().into())?;
    Some(dt.and_utc().into())
}
