use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use futures::io::{AsyncRead, AsyncReadExt, Cursor};
use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, Document},
    error::{Error, ErrorKind, GridFsErrorKind, GridFsFileIdentifier},
    gridfs::{GridFsBucket, DEFAULT_CHUNK_SIZE_BYTES},
    options::{
        Acknowledgment,
        GridFsBucketOptions,
        GridFsDownloadByNameOptions,
        GridFsUploadOptions,
        ReadConcern,
        WriteConcern,
    },
};

fn small_chunk_bucket(chunk_size_bytes: u32) -> GridFsBucket {
    GridFsBucket::new(
        GridFsBucketOptions::builder()
            .chunk_size_bytes(chunk_size_bytes)
            .build(),
    )
    .unwrap()
}

async fn download(bucket: &GridFsBucket, id: Bson) -> Vec<u8> {
    let mut buf = Vec::new();
    bucket
        .open_download_stream(id)
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap();
    buf
}

fn unwrap_io_error(error: io::Error) -> Error {
    *error.into_inner().unwrap().downcast::<Error>().unwrap()
}

#[test]
fn bucket_defaults() {
    let bucket = GridFsBucket::new(None).unwrap();
    assert_eq!(bucket.bucket_name(), "fs");
    assert_eq!(bucket.chunk_size_bytes(), DEFAULT_CHUNK_SIZE_BYTES);
    assert_eq!(bucket.chunk_size_bytes(), 255 * 1024);
    assert!(bucket.write_concern().is_none());
    assert!(bucket.read_concern().is_none());
}

#[test]
fn bucket_rejects_invalid_options() {
    let err = GridFsBucket::new(
        GridFsBucketOptions::builder()
            .write_concern(WriteConcern::nodes(-1))
            .build(),
    )
    .unwrap_err();
    assert!(err.is_validation_error());

    let err = GridFsBucket::new(
        GridFsBucketOptions::builder()
            .write_concern(
                WriteConcern::builder()
                    .w(Acknowledgment::Nodes(0))
                    .journal(true)
                    .build(),
            )
            .build(),
    )
    .unwrap_err();
    assert!(matches!(*err.kind, ErrorKind::Validation { field: "j", .. }));

    let err = GridFsBucket::new(GridFsBucketOptions::builder().chunk_size_bytes(0).build())
        .unwrap_err();
    assert!(matches!(*err.kind, ErrorKind::InvalidArgument { .. }));
}

#[tokio::test]
async fn upload_and_download() {
    let bucket = small_chunk_bucket(4);
    let contents = b"hello, gridfs".to_vec();

    let id = bucket
        .upload_from_futures_0_3_reader(
            "greeting.txt",
            Cursor::new(contents.clone()),
            GridFsUploadOptions::builder()
                .metadata(doc! { "lang": "en" })
                .build(),
        )
        .await
        .unwrap();

    let files = bucket.find(doc! { "_id": id }).await.unwrap();
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.length, contents.len() as u64);
    assert_eq!(file.chunk_size_bytes, 4);
    assert_eq!(file.n(), 4);
    assert_eq!(file.filename.as_deref(), Some("greeting.txt"));
    assert_eq!(file.metadata, Some(doc! { "lang": "en" }));

    assert_eq!(download(&bucket, id.into()).await, contents);

    let mut destination = Vec::new();
    bucket
        .download_to_futures_0_3_writer(id.into(), &mut destination)
        .await
        .unwrap();
    assert_eq!(destination, contents);
}

#[tokio::test]
async fn upload_empty_file() {
    let bucket = GridFsBucket::new(None).unwrap();
    let id = bucket
        .upload_from_futures_0_3_reader("empty", Cursor::new(Vec::new()), None)
        .await
        .unwrap();

    let mut stream = bucket.open_download_stream(id.into()).await.unwrap();
    assert_eq!(stream.files_collection_document().length, 0);
    let mut buf = Vec::new();
    assert_eq!(stream.read_to_end(&mut buf).await.unwrap(), 0);

    let chunk_inserts = bucket
        .recorded_commands()
        .await
        .into_iter()
        .filter(|command| command.get_str("insert").ok() == Some("fs.chunks"))
        .count();
    assert_eq!(chunk_inserts, 0);
}

#[tokio::test]
async fn upload_with_id() {
    let bucket = small_chunk_bucket(8);
    bucket
        .upload_from_futures_0_3_reader_with_id(
            Bson::Int32(7),
            "seven",
            Cursor::new(b"1234567".to_vec()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(download(&bucket, Bson::Int64(7)).await, b"1234567");

    let err = bucket
        .upload_from_futures_0_3_reader_with_id(
            Bson::Int32(7),
            "again",
            Cursor::new(b"x".to_vec()),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(*err.kind, ErrorKind::InvalidArgument { .. }));
}

#[tokio::test]
async fn commands_carry_bucket_concerns() {
    let bucket = GridFsBucket::new(
        GridFsBucketOptions::builder()
            .bucket_name("images".to_string())
            .write_concern(WriteConcern::builder().journal(false).build())
            .read_concern(ReadConcern::majority())
            .build(),
    )
    .unwrap();

    let id = bucket
        .upload_from_futures_0_3_reader("a.png", Cursor::new(b"png".to_vec()), None)
        .await
        .unwrap();
    download(&bucket, id.into()).await;

    let commands = bucket.recorded_commands().await;
    let mut saw_insert = false;
    let mut saw_find = false;
    for command in &commands {
        if command.contains_key("insert") {
            saw_insert = true;
            assert_eq!(
                command.get_document("writeConcern").unwrap(),
                &doc! { "j": false }
            );
            assert!(!command.contains_key("readConcern"));
        }
        if command.contains_key("find") {
            saw_find = true;
            assert_eq!(
                command.get_document("readConcern").unwrap(),
                &doc! { "level": "majority" }
            );
            assert!(!command.contains_key("writeConcern"));
        }
    }
    assert!(saw_insert && saw_find);

    let collections: Vec<&str> = commands
        .iter()
        .filter_map(|command| command.get_str("insert").ok())
        .collect();
    assert_eq!(collections, vec!["images.chunks", "images.files"]);
}

#[tokio::test]
async fn inherited_concerns_are_omitted() {
    let bucket = GridFsBucket::new(
        GridFsBucketOptions::builder()
            .write_concern(WriteConcern::server_default())
            .build(),
    )
    .unwrap();
    let id = bucket
        .upload_from_futures_0_3_reader("a", Cursor::new(b"a".to_vec()), None)
        .await
        .unwrap();
    bucket.delete(id.into()).await.unwrap();

    for command in bucket.recorded_commands().await {
        assert!(!command.contains_key("writeConcern"), "{}", command);
        assert!(!command.contains_key("readConcern"), "{}", command);
    }
}

#[tokio::test]
async fn download_by_filter() {
    let bucket = GridFsBucket::new(None).unwrap();
    bucket
        .upload_from_futures_0_3_reader("report.csv", Cursor::new(b"a,b".to_vec()), None)
        .await
        .unwrap();

    let err = bucket
        .open_download_stream_by_filter(None)
        .await
        .unwrap_err();
    assert!(
        matches!(*err.kind, ErrorKind::InvalidArgument { ref message } if message == "nil document")
    );

    let err = bucket
        .open_download_stream_by_filter(Some(doc! { "filename": "missing.csv" }))
        .await
        .unwrap_err();
    assert!(err.is_file_not_found());
    assert!(matches!(
        *err.kind,
        ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
            identifier: GridFsFileIdentifier::Filter(_)
        })
    ));

    let mut buf = Vec::new();
    bucket
        .open_download_stream_by_filter(Some(doc! { "filename": "report.csv" }))
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap();
    assert_eq!(buf, b"a,b");
}

#[tokio::test]
async fn download_by_name_revisions() {
    let bucket = GridFsBucket::new(None).unwrap();
    for contents in ["zero", "one", "two"] {
        bucket
            .upload_from_futures_0_3_reader("log.txt", Cursor::new(contents.as_bytes()), None)
            .await
            .unwrap();
    }

    let read_revision = |revision: Option<i32>| {
        let bucket = bucket.clone();
        async move {
            let options = revision.map(|revision| {
                GridFsDownloadByNameOptions::builder()
                    .revision(revision)
                    .build()
            });
            let mut stream = bucket
                .open_download_stream_by_name("log.txt", options)
                .await?;
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await?;
            Ok::<_, Error>(buf)
        }
    };

    assert_eq!(read_revision(None).await.unwrap(), "two");
    assert_eq!(read_revision(Some(-1)).await.unwrap(), "two");
    assert_eq!(read_revision(Some(0)).await.unwrap(), "zero");
    assert_eq!(read_revision(Some(1)).await.unwrap(), "one");
    assert_eq!(read_revision(Some(-3)).await.unwrap(), "zero");

    for revision in [3, -4] {
        let err = read_revision(Some(revision)).await.unwrap_err();
        assert!(matches!(
            *err.kind,
            ErrorKind::GridFs(GridFsErrorKind::RevisionNotFound { revision: r }) if r == revision
        ));
    }

    let err = bucket
        .open_download_stream_by_name("other.txt", None)
        .await
        .unwrap_err();
    assert!(err.is_file_not_found());
}

#[tokio::test]
async fn delete_rename_and_drop() {
    let bucket = small_chunk_bucket(2);
    let id = bucket
        .upload_from_futures_0_3_reader("old", Cursor::new(b"abcde".to_vec()), None)
        .await
        .unwrap();

    bucket.rename(id.into(), "new").await.unwrap();
    assert!(bucket.find(doc! { "filename": "old" }).await.unwrap().is_empty());
    assert_eq!(bucket.find(doc! { "filename": "new" }).await.unwrap().len(), 1);

    let err = bucket.rename(Bson::Int32(1), "x").await.unwrap_err();
    assert!(err.is_file_not_found());

    bucket.delete(id.into()).await.unwrap();
    assert!(bucket.find(doc! {}).await.unwrap().is_empty());
    assert!(bucket.inner.store.lock().await.chunks.is_empty());

    let err = bucket.delete(id.into()).await.unwrap_err();
    assert!(matches!(
        *err.kind,
        ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
            identifier: GridFsFileIdentifier::Id(_)
        })
    ));

    bucket
        .upload_from_futures_0_3_reader("kept", Cursor::new(b"xyz".to_vec()), None)
        .await
        .unwrap();
    bucket.drop().await.unwrap();
    assert!(bucket.find(doc! {}).await.unwrap().is_empty());

    let drops: Vec<Document> = bucket
        .recorded_commands()
        .await
        .into_iter()
        .filter(|command| command.contains_key("drop"))
        .collect();
    assert_eq!(
        drops,
        vec![doc! { "drop": "fs.files" }, doc! { "drop": "fs.chunks" }]
    );
}

#[tokio::test]
async fn missing_chunk_fails_download() {
    let bucket = small_chunk_bucket(3);
    let id = bucket
        .upload_from_futures_0_3_reader("file", Cursor::new(b"abcdefgh".to_vec()), None)
        .await
        .unwrap();
    bucket.inner.store.lock().await.chunks.remove(1);

    let mut buf = Vec::new();
    let err = bucket
        .open_download_stream(id.into())
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap_err();
    let err = unwrap_io_error(err);
    assert!(matches!(
        *err.kind,
        ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n: 1 })
    ));
}

#[tokio::test]
async fn wrong_size_chunk_fails_download() {
    let bucket = small_chunk_bucket(3);
    let id = bucket
        .upload_from_futures_0_3_reader("file", Cursor::new(b"abcdefgh".to_vec()), None)
        .await
        .unwrap();
    bucket.inner.store.lock().await.chunks[2].insert(
        "data",
        Binary {
            subtype: BinarySubtype::Generic,
            bytes: b"g".to_vec(),
        },
    );

    let mut buf = Vec::new();
    let err = bucket
        .open_download_stream(id.into())
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap_err();
    let err = unwrap_io_error(err);
    assert!(matches!(
        *err.kind,
        ErrorKind::GridFs(GridFsErrorKind::WrongSizeChunk {
            actual_size: 1,
            expected_size: 2,
            n: 2
        })
    ));
}

struct FailingReader {
    remaining: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let reader = self.get_mut();
        if reader.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "source went away",
            )));
        }
        let n = reader.remaining.min(buf.len());
        buf[..n].fill(b'x');
        reader.remaining -= n;
        Poll::Ready(Ok(n))
    }
}

#[tokio::test]
async fn failed_upload_removes_chunks() {
    let bucket = small_chunk_bucket(2);
    let err = bucket
        .upload_from_futures_0_3_reader("broken", FailingReader { remaining: 5 }, None)
        .await
        .unwrap_err();
    assert!(matches!(*err.kind, ErrorKind::Io(_)));

    let store = bucket.inner.store.lock().await;
    assert!(store.chunks.is_empty());
    assert!(store.files.is_empty());
}
