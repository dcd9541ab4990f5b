//! File endpoints of a transfer.
//!
//! [`SourceFile`] is the sending side: one open handle whose size and mtime
//! are taken from that same handle, so the header and the bytes that follow
//! describe the same file.
//!
//! [`PartialFile`] is the receiving side. Bytes land in a uniquely named
//! sibling of the destination and are renamed into place only once the
//! declared size has arrived:
//!
//! ```text
//!   docs/.<id>.peersync-part  ──commit──►  docs/a.txt
//!                             ──discard─►  (removed)
//! ```
//!
//! The temp name has a fixed length, so any name the filesystem accepts for
//! the destination can also be received. A reader of the destination never
//! sees partial content, and two receivers of the same path never share a
//! temp file.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{mtime_of, set_file_mtime, ContentError};

/// Suffix of in-flight temp files. The scanner ignores these.
pub const TEMP_SUFFIX: &str = ".peersync-part";

/// Random characters in a temp file name.
const TEMP_ID_LEN: usize = 10;

/// An open regular file about to be sent.
#[derive(Debug)]
pub struct SourceFile {
    /// Handle positioned at the start of the file.
    pub file: File,
    /// Length observed when opened.
    pub size: u64,
    /// Modification time observed when opened.
    pub mtime: f64,
}

impl SourceFile {
    /// Open `path` for sending.
    ///
    /// Missing paths and anything that is not a regular file give
    /// [`ContentError::NotFound`].
    pub async fn open(path: &Path) -> Result<Self, ContentError> {
        let file = File::open(path)
            .await
            .map_err(|e| ContentError::io(path, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| ContentError::io(path, e))?;
        if !metadata.is_file() {
            return Err(ContentError::NotFound(path.to_path_buf()));
        }
        Ok(Self {
            file,
            size: metadata.len(),
            mtime: mtime_of(&metadata),
        })
    }
}

/// Destination of an incoming transfer, not yet visible at its final path.
///
/// Dropping an uncommitted `PartialFile` removes the temp file.
#[derive(Debug)]
pub struct PartialFile {
    dest: PathBuf,
    temp: PathBuf,
    file: Option<File>,
    finished: bool,
}

impl PartialFile {
    /// Create the temp file for `dest`, creating parent directories as needed.
    pub async fn create(dest: &Path) -> Result<Self, ContentError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ContentError::io(parent, e))?;

        if dest.file_name().is_none() {
            return Err(ContentError::NotFound(dest.to_path_buf()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        let temp = parent.join(format!(".{}{}", &id[..TEMP_ID_LEN], TEMP_SUFFIX));

        let file = File::create(&temp)
            .await
            .map_err(|e| ContentError::io(&temp, e))?;
        tracing::trace!("receiving {} via {}", dest.display(), temp.display());

        Ok(Self {
            dest: dest.to_path_buf(),
            temp,
            file: Some(file),
            finished: false,
        })
    }

    /// Final path.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Temp path currently being written.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Flush, rename into place and apply `mtime`.
    ///
    /// Returns whether the mtime was applied. Failing to set it is logged
    /// and does not undo the commit.
    pub async fn commit(mut self, mtime: f64) -> Result<bool, ContentError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| ContentError::io(&self.temp, e))?;
            file.sync_all()
                .await
                .map_err(|e| ContentError::io(&self.temp, e))?;
        }

        tokio::fs::rename(&self.temp, &self.dest)
            .await
            .map_err(|e| ContentError::io(&self.dest, e))?;
        self.finished = true;

        match set_file_mtime(&self.dest, mtime) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!("could not set mtime on {}: {}", self.dest.display(), e);
                Ok(false)
            }
        }
    }

    /// Remove the temp file, leaving the destination untouched.
    pub async fn discard(mut self) {
        self.file.take();
        self.finished = true;
        if let Err(e) = tokio::fs::remove_file(&self.temp).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {}", self.temp.display(), e);
            }
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.finished {
            self.file.take();
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}

impl AsyncWrite for PartialFile {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(closed())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Err(closed())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "partial file already closed")
}
