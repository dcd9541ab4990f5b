//! Modification times as fractional Unix seconds.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use filetime::FileTime;

/// Modification time of `metadata`, seconds since the Unix epoch.
pub fn mtime_of(metadata: &Metadata) -> f64 {
    to_seconds(FileTime::from_last_modification_time(metadata))
}

/// Modification time of the file at `path`.
pub fn file_mtime(path: &Path) -> io::Result<f64> {
    std::fs::metadata(path).map(|md| mtime_of(&md))
}

/// Set the modification time of `path`, leaving its access time alone.
pub fn set_file_mtime(path: &Path, mtime: f64) -> io::Result<()> {
    filetime::set_file_mtime(path, from_seconds(mtime)?)
}

fn to_seconds(time: FileTime) -> f64 {
    time.unix_seconds() as f64 + f64::from(time.nanoseconds()) / 1e9
}

fn from_seconds(mtime: f64) -> io::Result<FileTime> {
    if !mtime.is_finite() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mtime {} is not a finite number", mtime),
        ));
    }
    let mut secs = mtime.floor();
    let mut nanos = ((mtime - secs) * 1e9).round();
    if nanos >= 1e9 {
        secs += 1.0;
        nanos = 0.0;
    }
    Ok(FileTime::from_unix_time(secs as i64, nanos as u32))
}
