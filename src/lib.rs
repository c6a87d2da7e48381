//! This crate contains the read and write concern model used by MongoDB clients: the typed
//! representation of a concern, the rules that make a concern valid, its canonical BSON encoding,
//! and the connection string options that configure it. It uses the [`bson`] crate for BSON
//! support.
//!
//! # Concerns
//! A [`WriteConcern`](options::WriteConcern) tells the server how much acknowledgement a write
//! needs before it is reported as successful, and a [`ReadConcern`](options::ReadConcern) selects
//! the consistency and isolation level for reads. Every field of a concern is either set
//! explicitly or absent, and absence is distinct from any falsy value: a write concern with
//! `j: false` is not the server default.
//!
//! ```rust
//! # use std::time::Duration;
//! use mongodb_concern::options::{Acknowledgment, WriteConcern};
//!
//! let write_concern = WriteConcern::builder()
//!     .w(Acknowledgment::Majority)
//!     .w_timeout(Duration::from_millis(500))
//!     .journal(false)
//!     .build();
//! write_concern.validate()?;
//!
//! let document = write_concern.to_document()?;
//! assert_eq!(
//!     document.keys().collect::<Vec<_>>(),
//!     vec!["w", "wtimeout", "j"]
//! );
//! # Ok::<(), mongodb_concern::error::Error>(())
//! ```
//!
//! # Connection strings
//! The `w`, `wtimeoutMS`, `journal` and `readConcernLevel` options are read from connection
//! strings by [`ConnectionString`](options::ConnectionString). An invalid concern rejects the
//! whole string.
//!
//! ```rust
//! use mongodb_concern::options::{ConnectionString, WriteConcern};
//!
//! let conn_str = ConnectionString::parse("mongodb://localhost/?w=2&journal=true")?;
//! assert_eq!(
//!     conn_str.write_concern,
//!     WriteConcern::builder()
//!         .w(2.into())
//!         .journal(true)
//!         .build()
//! );
//! assert!(ConnectionString::parse("mongodb://localhost/?w=0&journal=true").is_err());
//! # Ok::<(), mongodb_concern::error::Error>(())
//! ```
//!
//! # GridFS
//! The [`gridfs`] module provides an in-memory bucket whose recorded commands carry the bucket's
//! concerns, which makes it possible to observe how concerns are attached to real operations.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use ::bson;

mod bson_util;
pub mod client;
mod concern;
pub mod error;
pub mod gridfs;
pub mod options;
mod serde_util;
mod trace;
mod tri_state;

pub use concern::{resolve_read_concern, resolve_write_concern};
pub use tri_state::TriState;
