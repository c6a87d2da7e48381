use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::{options::GridFsDownloadByNameOptions, Chunk, FilesCollectionDocument, GridFsBucket};
use crate::{
    bson::{Bson, Document},
    error::{Error, ErrorKind, GridFsErrorKind, GridFsFileIdentifier, Result},
};

// User functions for locating and downloading stored files.
impl GridFsBucket {
    /// Opens and returns a [`GridFsDownloadStream`] from which the application can read the
    /// contents of the stored file specified by `id`.
    pub async fn open_download_stream(&self, id: Bson) -> Result<GridFsDownloadStream> {
        let file = self.find_file_by_id(&id).await?;
        self.download_stream_for(file).await
    }

    /// Opens and returns a [`GridFsDownloadStream`] for the first stored file whose files
    /// collection document matches `filter`.
    ///
    /// A missing filter is rejected with an [`ErrorKind::InvalidArgument`] error rather than
    /// being treated as a match-everything query. A filter that matches nothing returns a
    /// [`GridFsErrorKind::FileNotFound`] error.
    pub async fn open_download_stream_by_filter(
        &self,
        filter: Option<Document>,
    ) -> Result<GridFsDownloadStream> {
        let filter = filter.ok_or_else(|| Error::invalid_argument("nil document"))?;
        let file = self
            .find_files(filter.clone())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::from(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                    identifier: GridFsFileIdentifier::Filter(filter),
                }))
            })?;
        self.download_stream_for(file).await
    }

    /// Opens and returns a [`GridFsDownloadStream`] from which the application can read the
    /// contents of the stored file specified by `filename` and the revision in `options`.
    pub async fn open_download_stream_by_name(
        &self,
        filename: impl AsRef<str>,
        options: impl Into<Option<GridFsDownloadByNameOptions>>,
    ) -> Result<GridFsDownloadStream> {
        let revision = options
            .into()
            .and_then(|options| options.revision)
            .unwrap_or(-1);
        let file = self
            .find_file_by_name(filename.as_ref(), revision)
            .await?;
        self.download_stream_for(file).await
    }

    /// Downloads the contents of the stored file specified by `id` and writes the contents to
    /// `destination`, which may be any type that implements the [`futures_io::AsyncWrite`] trait.
    /// The destination is closed once the whole file has been written.
    pub async fn download_to_futures_0_3_writer<T>(
        &self,
        id: Bson,
        mut destination: T,
    ) -> Result<()>
    where
        T: AsyncWrite + Unpin,
    {
        let download_stream = self.open_download_stream(id).await?;
        futures_util::io::copy(download_stream, &mut destination).await?;
        destination.close().await?;
        Ok(())
    }

    async fn download_stream_for(
        &self,
        file: FilesCollectionDocument,
    ) -> Result<GridFsDownloadStream> {
        let chunks = if file.length == 0 {
            VecDeque::new()
        } else {
            self.find_chunks(&file.id).await?.into()
        };
        Ok(GridFsDownloadStream {
            file,
            chunks,
            buffer: VecDeque::new(),
            current_n: 0,
            failed: false,
        })
    }
}

/// A stream from which a file stored in a GridFS bucket can be downloaded.
///
/// The `GridFsDownloadStream` type implements [`futures_io::AsyncRead`]. It is recommended that
/// users call the utility methods in [`AsyncReadExt`](futures_util::io::AsyncReadExt) to interact
/// with the stream.
///
/// Chunks are checked as they are read: a chunk whose index is out of sequence, or whose length
/// doesn't match the length implied by the file's size, fails the read.
#[derive(Debug)]
pub struct GridFsDownloadStream {
    file: FilesCollectionDocument,
    chunks: VecDeque<Chunk>,
    buffer: VecDeque<u8>,
    current_n: u32,
    failed: bool,
}

impl GridFsDownloadStream {
    /// Gets the files collection document for the file being downloaded.
    pub fn files_collection_document(&self) -> &FilesCollectionDocument {
        &self.file
    }

    fn next_chunk(&mut self) -> Result<()> {
        let n = self.current_n;
        let chunk = match self.chunks.pop_front() {
            Some(chunk) if chunk.n == n => chunk,
            _ => return Err(ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n }).into()),
        };

        let expected_size = self.file.expected_chunk_length(n);
        if chunk.data.len() != expected_size as usize {
            return Err(ErrorKind::GridFs(GridFsErrorKind::WrongSizeChunk {
                actual_size: chunk.data.len(),
                expected_size,
                n,
            })
            .into());
        }

        self.buffer.extend(chunk.data);
        self.current_n += 1;
        Ok(())
    }
}

impl AsyncRead for GridFsDownloadStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::result::Result<usize, futures_util::io::Error>> {
        let stream = self.get_mut();
        if stream.failed {
            return Poll::Ready(Ok(0));
        }

        while stream.buffer.len() < buf.len() && stream.current_n < stream.file.n() {
            if let Err(error) = stream.next_chunk() {
                stream.failed = true;
                stream.buffer.clear();
                return Poll::Ready(Err(error.into_futures_io_error()));
            }
        }

        let bytes_to_write = std::cmp::min(stream.buffer.len(), buf.len());
        for (slot, byte) in buf.iter_mut().zip(stream.buffer.drain(..bytes_to_write)) {
            *slot = byte;
        }
        Poll::Ready(Ok(bytes_to_write))
    }
}
