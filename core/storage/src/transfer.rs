//! Chunked transfer engine.
//!
//! A [`Download`] walks an object in ranged chunks and is consumed as a lazy
//! stream of [`TransferEvent`]s: one `Progress` per chunk, then a single
//! `Complete` carrying the assembled bytes. [`download_to_path`] drives that
//! stream and writes the result through a sibling temporary file so the
//! destination only ever appears complete.

use futures::{stream, Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use drivekeep_common::{Error, FileId, Result};

use crate::catalog::CatalogClient;

/// Lifecycle of a single upload or download.
///
/// `Init -> InProgress -> Complete | Failed`. A failed transfer is not
/// resumed; the caller starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Init,
    InProgress,
    Complete,
    Failed,
}

/// Bytes moved so far out of the object total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_so_far: u64,
    pub total_bytes: u64,
}

impl Progress {
    /// Completed fraction in `0.0..=1.0`. An empty object is complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            (self.bytes_so_far as f64 / self.total_bytes as f64).min(1.0)
        }
    }

    /// Whole percent, rounded down.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.bytes_so_far.min(self.total_bytes) * 100 / self.total_bytes;
        pct as u8
    }

    pub fn is_done(&self) -> bool {
        self.bytes_so_far >= self.total_bytes
    }
}

/// Item of a download stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// A chunk arrived.
    Progress(Progress),
    /// All chunks arrived; the stream ends after this event.
    Complete(Vec<u8>),
}

/// In-flight chunked download of one object.
pub struct Download<'a, C: CatalogClient + ?Sized> {
    catalog: &'a C,
    id: FileId,
    chunk_size: u64,
    buffer: Vec<u8>,
    /// Object size reported by the first chunk.
    total_size: Option<u64>,
    state: TransferState,
}

impl<'a, C: CatalogClient + ?Sized> Download<'a, C> {
    /// Prepare a download; nothing is fetched until the first chunk.
    pub fn new(catalog: &'a C, id: FileId) -> Self {
        let chunk_size = catalog.download_chunk_size().max(1);
        Self {
            catalog,
            id,
            chunk_size,
            buffer: Vec::new(),
            total_size: None,
            state: TransferState::Init,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Fetch the next chunk and append it to the buffer.
    ///
    /// # Errors
    /// - Whatever the catalog reports for the chunk (`NotFound`, `Transfer`)
    /// - `Transfer` if the service sends more bytes than announced, stalls,
    ///   or reports a different object size than the first chunk did
    /// - `InvalidInput` if called after completion
    pub async fn next_chunk(&mut self) -> Result<Progress> {
        match self.state {
            TransferState::Complete => {
                return Err(Error::InvalidInput(format!(
                    "Download of {} is already complete",
                    self.id
                )));
            }
            TransferState::Failed => {
                return Err(Error::Transfer(format!(
                    "Download of {} failed and must be restarted",
                    self.id
                )));
            }
            TransferState::Init | TransferState::InProgress => {}
        }

        self.state = TransferState::InProgress;
        let offset = self.buffer.len() as u64;

        let chunk = match self
            .catalog
            .fetch_chunk(&self.id, offset, self.chunk_size)
            .await
        {
            Ok(chunk) => chunk,
            Err(e) => {
                self.state = TransferState::Failed;
                return Err(e);
            }
        };

        let total_size = *self.total_size.get_or_insert(chunk.total_size);
        if chunk.total_size != total_size {
            self.state = TransferState::Failed;
            return Err(Error::Transfer(format!(
                "Size of {} changed from {} to {} during download",
                self.id, total_size, chunk.total_size
            )));
        }

        let received = offset + chunk.data.len() as u64;
        if received > chunk.total_size {
            self.state = TransferState::Failed;
            return Err(Error::Transfer(format!(
                "Received {} bytes of {} for {}",
                received, chunk.total_size, self.id
            )));
        }
        if chunk.data.is_empty() && received < chunk.total_size {
            self.state = TransferState::Failed;
            return Err(Error::Transfer(format!(
                "Empty chunk at offset {} of {} for {}",
                offset, chunk.total_size, self.id
            )));
        }

        self.buffer.extend_from_slice(&chunk.data);
        let progress = Progress {
            bytes_so_far: received,
            total_bytes: chunk.total_size,
        };
        if progress.is_done() {
            self.state = TransferState::Complete;
        }

        debug!(
            file_id = %self.id,
            bytes = progress.bytes_so_far,
            total = progress.total_bytes,
            "Downloaded chunk"
        );

        Ok(progress)
    }

    /// Take the assembled content of a completed download.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.state != TransferState::Complete {
            return Err(Error::InvalidInput(format!(
                "Download of {} is not complete",
                self.id
            )));
        }
        Ok(self.buffer)
    }

    /// Consume the download as a finite stream of events.
    ///
    /// The stream yields one `Progress` per chunk and ends with `Complete`.
    /// After an error it yields nothing further.
    pub fn events(self) -> impl Stream<Item = Result<TransferEvent>> + Send + 'a {
        stream::try_unfold(Some(self), |state| async move {
            let Some(mut download) = state else {
                return Ok(None);
            };

            if download.state() == TransferState::Complete {
                let bytes = download.into_bytes()?;
                return Ok(Some((TransferEvent::Complete(bytes), None)));
            }

            let progress = download.next_chunk().await?;
            Ok(Some((TransferEvent::Progress(progress), Some(download))))
        })
    }
}

/// Download `id` into `destination`, returning the number of bytes written.
///
/// Progress is reported after every chunk. The destination is written only
/// after the whole object has arrived.
pub async fn download_to_path<C: CatalogClient + ?Sized>(
    catalog: &C,
    id: &FileId,
    destination: &Path,
    on_progress: &mut (dyn FnMut(Progress) + Send),
) -> Result<u64> {
    let events = Download::new(catalog, id.clone()).events();
    futures::pin_mut!(events);

    let mut content = None;
    while let Some(event) = events.try_next().await? {
        match event {
            TransferEvent::Progress(progress) => on_progress(progress),
            TransferEvent::Complete(bytes) => content = Some(bytes),
        }
    }

    let content = content
        .ok_or_else(|| Error::Transfer(format!("Download of {} ended without content", id)))?;

    write_atomically(destination, &content).await?;

    info!(
        file_id = %id,
        bytes = content.len(),
        path = %destination.display(),
        "Download complete"
    );

    Ok(content.len() as u64)
}

/// Write `data` to a temporary sibling of `destination`, then rename it.
async fn write_atomically(destination: &Path, data: &[u8]) -> Result<()> {
    let temp = temp_sibling(destination)?;

    if let Err(e) = fs::write(&temp, data).await {
        let _ = fs::remove_file(&temp).await;
        return Err(Error::Transfer(format!(
            "Failed to write {}: {}",
            destination.display(),
            e
        )));
    }

    if let Err(e) = fs::rename(&temp, destination).await {
        let _ = fs::remove_file(&temp).await;
        return Err(Error::Transfer(format!(
            "Failed to move download into {}: {}",
            destination.display(),
            e
        )));
    }

    Ok(())
}

fn temp_sibling(destination: &Path) -> Result<PathBuf> {
    let file_name = destination
        .file_name()
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Download path '{}' has no file name",
                destination.display()
            ))
        })?
        .to_string_lossy();

    let parent = match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(parent.join(format!(".{}.{}.part", file_name, Uuid::new_v4().simple())))
}
