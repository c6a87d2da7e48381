//! An in-memory GridFS bucket.
//!
//! The bucket stores files collection documents and chunks as BSON documents and records every
//! command it would send to a server. Each recorded write carries the bucket's write concern and
//! each recorded read carries its read concern, so callers can observe exactly what a deployment
//! would receive.

mod download;
pub mod options;
#[cfg(test)]
mod test;
mod upload;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tokio::sync::Mutex;

use crate::{
    bson::{doc, oid::ObjectId, Bson, DateTime, Document},
    bson_util::matches_filter,
    concern::{ReadConcern, WriteConcern},
    error::{Error, ErrorKind, GridFsErrorKind, GridFsFileIdentifier, Result},
    serde_util::{
        deserialize_u32_from_bson_number,
        deserialize_u64_from_bson_number,
        serialize_u32_as_i32,
        serialize_u64_as_i64,
    },
    trace::{TracingRepresentation, GRIDFS_TRACING_EVENT_TARGET},
};

pub use download::GridFsDownloadStream;
use options::GridFsBucketOptions;

pub(crate) const DEFAULT_BUCKET_NAME: &str = "fs";
pub(crate) const DEFAULT_CHUNK_SIZE_BYTES: u32 = 255 * 1024;

/// A collection in which information about stored files is stored. There will be one files
/// collection document per stored file.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FilesCollectionDocument {
    /// The file's unique identifier.
    #[serde(rename = "_id")]
    pub id: Bson,

    /// The length of the file in bytes.
    #[serde(
        serialize_with = "serialize_u64_as_i64",
        deserialize_with = "deserialize_u64_from_bson_number"
    )]
    pub length: u64,

    /// The size of the file's chunks in bytes.
    #[serde(
        rename = "chunkSize",
        serialize_with = "serialize_u32_as_i32",
        deserialize_with = "deserialize_u32_from_bson_number"
    )]
    pub chunk_size_bytes: u32,

    /// The time at which the file was uploaded.
    pub upload_date: DateTime,

    /// The name of the file.
    pub filename: Option<String>,

    /// User-provided metadata associated with the file.
    pub metadata: Option<Document>,
}

impl FilesCollectionDocument {
    /// Returns the total number of length-[`chunk_size_bytes`] chunks needed to store a file of
    /// length `length`.
    pub(crate) fn n(&self) -> u32 {
        Self::n_from_vals(self.length, self.chunk_size_bytes)
    }

    pub(crate) fn n_from_vals(length: u64, chunk_size_bytes: u32) -> u32 {
        let chunk_size_bytes = u64::from(chunk_size_bytes);
        let n = length.div_ceil(chunk_size_bytes);
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    /// Returns the expected length of a chunk given its index.
    pub(crate) fn expected_chunk_length(&self, n: u32) -> u32 {
        Self::expected_chunk_length_from_vals(self.length, self.chunk_size_bytes, n)
    }

    pub(crate) fn expected_chunk_length_from_vals(
        length: u64,
        chunk_size_bytes: u32,
        n: u32,
    ) -> u32 {
        let remainder = length % u64::from(chunk_size_bytes);
        let last_n = Self::n_from_vals(length, chunk_size_bytes).checked_sub(1);
        if remainder != 0 && last_n == Some(n) {
            // The remainder is strictly smaller than `chunk_size_bytes`.
            remainder as u32
        } else {
            chunk_size_bytes
        }
    }
}

/// A single chunk of a stored file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Chunk {
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,

    pub(crate) files_id: Bson,

    #[serde(
        serialize_with = "serialize_u32_as_i32",
        deserialize_with = "deserialize_u32_from_bson_number"
    )]
    pub(crate) n: u32,

    #[serde(with = "serde_bytes")]
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Store {
    files: Vec<Document>,
    chunks: Vec<Document>,
    commands: Vec<Document>,
}

impl Store {
    fn record(&mut self, command: Document) {
        tracing::debug!(
            target: GRIDFS_TRACING_EVENT_TARGET,
            command = command.tracing_representation(),
            "recorded command",
        );
        self.commands.push(command);
    }
}

#[derive(Debug)]
struct GridFsBucketInner {
    bucket_name: String,
    chunk_size_bytes: u32,
    write_concern: Option<WriteConcern>,
    read_concern: Option<ReadConcern>,
    store: Mutex<Store>,
}

/// A GridFS bucket. Cloning a bucket is cheap; clones share the same stored files.
#[derive(Clone, Debug)]
pub struct GridFsBucket {
    inner: Arc<GridFsBucketInner>,
}

impl GridFsBucket {
    /// Creates a new bucket. The configured concerns are validated here, so a bucket can never
    /// hold a concern that would fail to encode.
    pub fn new(options: impl Into<Option<GridFsBucketOptions>>) -> Result<Self> {
        let options = options.into().unwrap_or_default();

        if let Some(ref write_concern) = options.write_concern {
            write_concern.validate()?;
        }
        if let Some(ref read_concern) = options.read_concern {
            read_concern.validate()?;
        }

        let chunk_size_bytes = options.chunk_size_bytes.unwrap_or(DEFAULT_CHUNK_SIZE_BYTES);
        check_chunk_size(chunk_size_bytes)?;

        Ok(Self {
            inner: Arc::new(GridFsBucketInner {
                bucket_name: options
                    .bucket_name
                    .unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
                chunk_size_bytes,
                write_concern: options.write_concern,
                read_concern: options.read_concern,
                store: Mutex::new(Store::default()),
            }),
        })
    }

    /// Gets the name of this bucket.
    pub fn bucket_name(&self) -> &str {
        &self.inner.bucket_name
    }

    /// Gets the default chunk size in bytes for files uploaded to this bucket.
    pub fn chunk_size_bytes(&self) -> u32 {
        self.inner.chunk_size_bytes
    }

    /// Gets the write concern of this bucket, if one was configured.
    pub fn write_concern(&self) -> Option<&WriteConcern> {
        self.inner.write_concern.as_ref()
    }

    /// Gets the read concern of this bucket, if one was configured.
    pub fn read_concern(&self) -> Option<&ReadConcern> {
        self.inner.read_concern.as_ref()
    }

    /// Returns every command this bucket has issued, oldest first.
    pub async fn recorded_commands(&self) -> Vec<Document> {
        self.inner.store.lock().await.commands.clone()
    }

    /// Finds the files collection documents matching `filter`, in upload order. Matching is
    /// equality on each top-level field of the filter.
    pub async fn find(&self, filter: Document) -> Result<Vec<FilesCollectionDocument>> {
        self.find_files(filter).await
    }

    /// Deletes the file with the given `id` and all of its chunks. Chunks are deleted even when
    /// no files collection document exists, which cleans up orphans; the call still reports a
    /// [`GridFsErrorKind::FileNotFound`] error in that case.
    pub async fn delete(&self, id: Bson) -> Result<()> {
        let deleted_count = self
            .delete_many(self.files_collection(), doc! { "_id": id.clone() })
            .await?;
        self.delete_many(self.chunks_collection(), doc! { "files_id": id.clone() })
            .await?;

        if deleted_count == 0 {
            return Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Id(id),
            })
            .into());
        }

        Ok(())
    }

    /// Renames the file with the given `id` to `new_filename`.
    pub async fn rename(&self, id: Bson, new_filename: impl AsRef<str>) -> Result<()> {
        let new_filename = new_filename.as_ref();
        let filter = doc! { "_id": id.clone() };
        let mut command = doc! {
            "update": self.files_collection(),
            "updates": [{ "q": filter.clone(), "u": { "$set": { "filename": new_filename } } }],
        };
        self.append_write_concern(&mut command)?;

        let mut store = self.inner.store.lock().await;
        store.record(command);
        let file = store
            .files
            .iter_mut()
            .find(|file| matches_filter(&filter, file));
        match file {
            Some(file) => {
                file.insert("filename", new_filename);
                Ok(())
            }
            None => Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Id(id),
            })
            .into()),
        }
    }

    /// Removes every file and chunk from the bucket.
    pub async fn drop(&self) -> Result<()> {
        let mut commands = Vec::with_capacity(2);
        for collection in [self.files_collection(), self.chunks_collection()] {
            let mut command = doc! { "drop": collection };
            self.append_write_concern(&mut command)?;
            commands.push(command);
        }

        let mut store = self.inner.store.lock().await;
        for command in commands {
            store.record(command);
        }
        store.files.clear();
        store.chunks.clear();
        Ok(())
    }

    fn files_collection(&self) -> String {
        format!("{}.files", self.inner.bucket_name)
    }

    fn chunks_collection(&self) -> String {
        format!("{}.chunks", self.inner.bucket_name)
    }

    fn append_write_concern(&self, command: &mut Document) -> Result<()> {
        match self.inner.write_concern {
            Some(ref write_concern) => write_concern.append_to_command(command),
            None => Ok(()),
        }
    }

    fn append_read_concern(&self, command: &mut Document) -> Result<()> {
        match self.inner.read_concern {
            Some(ref read_concern) => read_concern.append_to_command(command),
            None => Ok(()),
        }
    }

    async fn insert_one<T: Serialize>(&self, collection: String, document: &T) -> Result<()> {
        let document = crate::bson::to_document(document)?;
        let is_files = collection == self.files_collection();
        let mut command = doc! {
            "insert": collection,
            "documents": [document.clone()],
        };
        self.append_write_concern(&mut command)?;

        let mut store = self.inner.store.lock().await;
        store.record(command);
        if is_files {
            store.files.push(document);
        } else {
            store.chunks.push(document);
        }
        Ok(())
    }

    async fn delete_many(&self, collection: String, filter: Document) -> Result<u64> {
        let is_files = collection == self.files_collection();
        let mut command = doc! {
            "delete": collection,
            "deletes": [{ "q": filter.clone(), "limit": 0 }],
        };
        self.append_write_concern(&mut command)?;

        let mut store = self.inner.store.lock().await;
        store.record(command);
        let documents = if is_files {
            &mut store.files
        } else {
            &mut store.chunks
        };
        let before = documents.len();
        documents.retain(|document| !matches_filter(&filter, document));
        Ok((before - documents.len()) as u64)
    }

    async fn find_files(&self, filter: Document) -> Result<Vec<FilesCollectionDocument>> {
        let mut command = doc! { "find": self.files_collection(), "filter": filter.clone() };
        self.append_read_concern(&mut command)?;

        let mut store = self.inner.store.lock().await;
        store.record(command);
        store
            .files
            .iter()
            .filter(|file| matches_filter(&filter, file))
            .map(|file| crate::bson::from_document(file.clone()).map_err(Error::from))
            .collect()
    }

    async fn find_chunks(&self, files_id: &Bson) -> Result<Vec<Chunk>> {
        let filter = doc! { "files_id": files_id.clone() };
        let mut command = doc! {
            "find": self.chunks_collection(),
            "filter": filter.clone(),
            "sort": { "n": 1 },
        };
        self.append_read_concern(&mut command)?;

        let mut store = self.inner.store.lock().await;
        store.record(command);
        let mut chunks = store
            .chunks
            .iter()
            .filter(|chunk| matches_filter(&filter, chunk))
            .map(|chunk| crate::bson::from_document::<Chunk>(chunk.clone()).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        chunks.sort_by_key(|chunk| chunk.n);
        Ok(chunks)
    }

    async fn find_file_by_id(&self, id: &Bson) -> Result<FilesCollectionDocument> {
        self.find_files(doc! { "_id": id.clone() })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                    identifier: GridFsFileIdentifier::Id(id.clone()),
                })
                .into()
            })
    }

    async fn find_file_by_name(
        &self,
        filename: &str,
        revision: i32,
    ) -> Result<FilesCollectionDocument> {
        // Files are kept in upload order, and the sort is stable, so revisions that share an
        // upload date keep their relative order.
        let mut files = self.find_files(doc! { "filename": filename }).await?;
        if files.is_empty() {
            return Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Filename(filename.to_string()),
            })
            .into());
        }
        files.sort_by_key(|file| file.upload_date);

        let index = if revision >= 0 {
            usize::try_from(revision).ok()
        } else {
            usize::try_from(revision.unsigned_abs())
                .ok()
                .and_then(|from_newest| files.len().checked_sub(from_newest))
        };

        match index {
            Some(index) if index < files.len() => Ok(files.swap_remove(index)),
            _ => Err(ErrorKind::GridFs(GridFsErrorKind::RevisionNotFound { revision }).into()),
        }
    }
}

fn check_chunk_size(chunk_size_bytes: u32) -> Result<()> {
    if chunk_size_bytes == 0 {
        return Err(Error::invalid_argument("chunk size must be greater than zero"));
    }
    Ok(())
}
