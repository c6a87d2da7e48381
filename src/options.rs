//! Contains all of the types needed to configure concerns, connection strings and GridFS buckets.
//!
//! Most of the options structs in this module use the
//! [`typed-builder`](https://crates.io/crates/typed-builder) crate to derive a type-safe builder
//! API on them. For example, to create an instance of
//! [`GridFsUploadOptions`](struct.GridFsUploadOptions.html) with only `chunk_size_bytes` set, the
//! builder API can be used as follows:
//!
//! ```rust
//! # use mongodb_concern::options::GridFsUploadOptions;
//! #
//! # let options = GridFsUploadOptions::builder()
//! #                   .chunk_size_bytes(1024)
//! #                   .build();
//! ```

pub use crate::{client::options::*, concern::*, gridfs::options::*};
