use futures_util::io::{AsyncRead, AsyncReadExt};

use super::{
    check_chunk_size,
    options::GridFsUploadOptions,
    Chunk,
    FilesCollectionDocument,
    GridFsBucket,
};
use crate::{
    bson::{doc, oid::ObjectId, Bson, DateTime},
    error::{Error, Result},
    trace::{TracingRepresentation, GRIDFS_TRACING_EVENT_TARGET},
};

// User functions for uploading from readers.
impl GridFsBucket {
    /// Uploads a user file to the bucket. Bytes are read from `source`, which may be any type that
    /// implements the [`futures_io::AsyncRead`] trait, and stored in chunks in the bucket's
    /// chunks collection. After all the chunks have been uploaded, a corresponding
    /// [`FilesCollectionDocument`] is stored in the bucket's files collection.
    ///
    /// This method generates an [`ObjectId`] for the `id` field of the
    /// [`FilesCollectionDocument`] and returns it.
    pub async fn upload_from_futures_0_3_reader<T>(
        &self,
        filename: impl AsRef<str>,
        source: T,
        options: impl Into<Option<GridFsUploadOptions>>,
    ) -> Result<ObjectId>
    where
        T: AsyncRead + Unpin,
    {
        let id = ObjectId::new();
        self.upload_from_futures_0_3_reader_with_id(id.into(), filename, source, options)
            .await?;
        Ok(id)
    }

    /// Uploads a user file to the bucket. Bytes are read from `source`, which may be any type that
    /// implements the [`futures_io::AsyncRead`] trait, and stored in chunks in the bucket's
    /// chunks collection. After all the chunks have been uploaded, a corresponding
    /// [`FilesCollectionDocument`] with the given `id` is stored in the bucket's files collection.
    ///
    /// If reading from `source` fails, any chunks already written for `id` are removed.
    pub async fn upload_from_futures_0_3_reader_with_id<T>(
        &self,
        id: Bson,
        filename: impl AsRef<str>,
        mut source: T,
        options: impl Into<Option<GridFsUploadOptions>>,
    ) -> Result<()>
    where
        T: AsyncRead + Unpin,
    {
        let options = options.into();

        let chunk_size_bytes = options
            .as_ref()
            .and_then(|opts| opts.chunk_size_bytes)
            .unwrap_or_else(|| self.chunk_size_bytes());
        check_chunk_size(chunk_size_bytes)?;

        if !self.find_files(doc! { "_id": id.clone() }).await?.is_empty() {
            return Err(Error::invalid_argument(format!(
                "a file with id {} already exists in bucket {}",
                id,
                self.bucket_name()
            )));
        }

        let mut length = 0u64;
        let mut n = 0;

        let mut buf = vec![0u8; chunk_size_bytes as usize];
        loop {
            let bytes_read = match read_exact_or_to_end(&mut buf, &mut source).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(error) => return self.clean_up_chunks(id, error).await,
            };

            let chunk = Chunk {
                id: ObjectId::new(),
                files_id: id.clone(),
                n,
                data: buf[..bytes_read].to_vec(),
            };
            self.insert_one(self.chunks_collection(), &chunk).await?;

            length += bytes_read as u64;
            n += 1;
        }

        let file = FilesCollectionDocument {
            id,
            length,
            chunk_size_bytes,
            upload_date: DateTime::now(),
            filename: Some(filename.as_ref().to_string()),
            metadata: options.and_then(|opts| opts.metadata),
        };
        self.insert_one(self.files_collection(), &file).await?;

        Ok(())
    }

    async fn clean_up_chunks(&self, id: Bson, original_error: Error) -> Result<()> {
        tracing::debug!(
            target: GRIDFS_TRACING_EVENT_TARGET,
            files_id = id.tracing_representation(),
            error = original_error.tracing_representation(),
            "upload failed, removing written chunks",
        );
        self.delete_many(self.chunks_collection(), doc! { "files_id": id })
            .await?;
        Err(original_error)
    }
}

async fn read_exact_or_to_end<T>(buf: &mut [u8], source: &mut T) -> Result<usize>
where
    T: AsyncRead + Unpin,
{
    let mut total_bytes_read = 0;
    loop {
        let bytes_read = match source.read(&mut buf[total_bytes_read..]).await? {
            0 => break,
            n => n,
        };
        total_bytes_read += bytes_read;
        if total_bytes_read == buf.len() {
            break;
        }
    }

    Ok(total_bytes_read)
}
