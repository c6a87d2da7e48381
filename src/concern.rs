//! Contains the types for read concerns and write concerns.

mod document;

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use typed_builder::TypedBuilder;

use crate::{
    bson::Document,
    error::{Error, Result},
    trace::{TracingRepresentation, CONCERN_TRACING_EVENT_TARGET},
    tri_state::TriState,
};

/// Specifies the consistency and isolation properties of read operations from replica sets and
/// replica set shards.
///
/// A read concern with no level is the server's default: it encodes to an empty document and
/// defers to whatever the session, transaction or server decides.
///
/// See the documentation [here](https://www.mongodb.com/docs/manual/reference/read-concern/) for more
/// information about read concerns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct ReadConcern {
    pub(crate) level: TriState<ReadConcernLevel>,
}

impl ReadConcern {
    /// Creates a read concern with level "majority".
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-majority/).
    pub fn majority() -> Self {
        ReadConcernLevel::Majority.into()
    }

    /// Creates a read concern with level "local".
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-local/).
    pub fn local() -> Self {
        ReadConcernLevel::Local.into()
    }

    /// Creates a read concern with level "linearizable".
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-linearizable/).
    pub fn linearizable() -> Self {
        ReadConcernLevel::Linearizable.into()
    }

    /// Creates a read concern with level "available".
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-available/).
    pub fn available() -> Self {
        ReadConcernLevel::Available.into()
    }

    /// Creates a read concern with level "snapshot".
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-snapshot/).
    pub fn snapshot() -> Self {
        ReadConcernLevel::Snapshot.into()
    }

    /// Creates a read concern with a custom read concern level. This is present to provide forwards
    /// compatibility with any future read concerns which may be added to new versions of
    /// MongoDB.
    pub fn custom(level: impl AsRef<str>) -> Self {
        ReadConcernLevel::from_str(level.as_ref()).into()
    }

    /// Creates a read concern that leaves the level up to the server.
    pub fn server_default() -> Self {
        Self::default()
    }

    /// The level of the read concern.
    pub fn level(&self) -> &TriState<ReadConcernLevel> {
        &self.level
    }

    /// Whether this read concern specifies nothing and thus encodes to an empty document.
    pub fn is_server_default(&self) -> bool {
        self.level.is_absent()
    }

    /// Validates the read concern. Levels are passed through to the server unchecked, so every
    /// read concern is currently valid; this exists so that read and write concerns go through the
    /// same construction path.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Returns `fallback` if this read concern is the server default, and a copy of this read
    /// concern otherwise.
    pub fn inherit_from(&self, fallback: &ReadConcern) -> ReadConcern {
        if self.is_server_default() {
            fallback.clone()
        } else {
            self.clone()
        }
    }

    /// Appends this read concern to `command` as its `readConcern` field. Nothing is appended for
    /// the server default.
    pub fn append_to_command(&self, command: &mut Document) -> Result<()> {
        if self.is_server_default() {
            return Ok(());
        }
        command.insert("readConcern", self.to_document()?);
        Ok(())
    }
}

impl From<ReadConcernLevel> for ReadConcern {
    fn from(level: ReadConcernLevel) -> Self {
        Self {
            level: TriState::set(level),
        }
    }
}

/// Specifies the level consistency and isolation properties of a given `ReadConcern`.
///
/// See the documentation [here](https://www.mongodb.com/docs/manual/reference/read-concern/) for more
/// information about read concerns.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReadConcernLevel {
    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-local/).
    Local,

    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-majority/).
    Majority,

    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-linearizable/).
    Linearizable,

    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-available/).
    Available,

    /// See the specific documentation for this read concern level [here](https://www.mongodb.com/docs/manual/reference/read-concern-snapshot/).
    Snapshot,

    /// Specify a custom read concern level. This is present to provide forwards compatibility with
    /// any future read concerns which may be added to new versions of MongoDB.
    Custom(String),
}

impl ReadConcernLevel {
    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "local" => ReadConcernLevel::Local,
            "majority" => ReadConcernLevel::Majority,
            "linearizable" => ReadConcernLevel::Linearizable,
            "available" => ReadConcernLevel::Available,
            "snapshot" => ReadConcernLevel::Snapshot,
            s => ReadConcernLevel::Custom(s.to_string()),
        }
    }

    /// Gets the string representation of the `ReadConcernLevel`.
    pub fn as_str(&self) -> &str {
        match self {
            ReadConcernLevel::Local => "local",
            ReadConcernLevel::Majority => "majority",
            ReadConcernLevel::Linearizable => "linearizable",
            ReadConcernLevel::Available => "available",
            ReadConcernLevel::Snapshot => "snapshot",
            ReadConcernLevel::Custom(ref s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for ReadConcernLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ReadConcernLevel::from_str(&s))
    }
}

impl Serialize for ReadConcernLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

/// Specifies the level of acknowledgement requested from the server for write operations.
///
/// Every field is a [`TriState`]: a field that was never specified is omitted from the encoded
/// document, while an explicitly specified `false` or `0` is always encoded. A write concern with
/// no fields specified is the server's default.
///
/// ```rust
/// # use std::time::Duration;
/// # use mongodb_concern::options::{Acknowledgment, WriteConcern};
/// let write_concern = WriteConcern::builder()
///     .w(Acknowledgment::Majority)
///     .w_timeout(Duration::from_millis(500))
///     .journal(false)
///     .build();
/// assert!(write_concern.validate().is_ok());
/// ```
///
/// See the documentation [here](https://www.mongodb.com/docs/manual/reference/write-concern/) for more
/// information about write concerns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, TypedBuilder)]
#[builder(field_defaults(default))]
#[non_exhaustive]
pub struct WriteConcern {
    /// Requests acknowledgement that the operation has propagated to a specific number or variety
    /// of servers.
    #[builder(setter(transform = |w: Acknowledgment| TriState::set(w)))]
    pub(crate) w: TriState<Acknowledgment>,

    /// Specifies a time limit for the write concern, in milliseconds. Kept signed so that a
    /// negative value read from a connection string or document can be rejected by validation.
    #[builder(setter(transform = |w_timeout: Duration| TriState::set(duration_to_millis(w_timeout))))]
    pub(crate) w_timeout: TriState<i64>,

    /// Requests acknowledgement that the operation has propagated to the on-disk journal.
    #[builder(setter(transform = |journal: bool| TriState::set(journal)))]
    pub(crate) journal: TriState<bool>,
}

fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// The type of the `w` field in a [`WriteConcern`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Acknowledgment {
    /// Requires acknowledgement that the write has reached the specified number of nodes.
    ///
    /// Note: specifying 0 here indicates that the write is unacknowledged. A negative number is
    /// representable so that it can be reported by [`WriteConcern::validate`].
    Nodes(i32),

    /// Requires acknowledgement that the write has reached the majority of nodes.
    Majority,

    /// Requires acknowledgement according to the given custom write concern. See [here](https://www.mongodb.com/docs/manual/tutorial/configure-replica-set-tag-sets/#tag-sets-and-custom-write-concern-behavior)
    /// for more information.
    Custom(String),
}

impl Acknowledgment {
    /// The tag string for this acknowledgment, or `None` for a node count.
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Acknowledgment::Nodes(_) => None,
            Acknowledgment::Majority => Some("majority"),
            Acknowledgment::Custom(s) => Some(s),
        }
    }
}

impl Serialize for Acknowledgment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Acknowledgment::Majority => serializer.serialize_str("majority"),
            Acknowledgment::Nodes(n) => serializer.serialize_i32(*n),
            Acknowledgment::Custom(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for Acknowledgment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IntOrString {
            Int(i32),
            String(String),
        }
        match IntOrString::deserialize(deserializer)? {
            IntOrString::String(s) => Ok(s.into()),
            IntOrString::Int(i) => Ok(i.into()),
        }
    }
}

impl From<i32> for Acknowledgment {
    fn from(i: i32) -> Self {
        Acknowledgment::Nodes(i)
    }
}

impl From<&str> for Acknowledgment {
    fn from(s: &str) -> Self {
        if s == "majority" {
            Acknowledgment::Majority
        } else {
            Acknowledgment::Custom(s.to_string())
        }
    }
}

impl From<String> for Acknowledgment {
    fn from(s: String) -> Self {
        if s == "majority" {
            Acknowledgment::Majority
        } else {
            Acknowledgment::Custom(s)
        }
    }
}

impl WriteConcern {
    /// A `WriteConcern` requesting [`Acknowledgment::Nodes`].
    pub fn nodes(v: i32) -> Self {
        Acknowledgment::Nodes(v).into()
    }

    /// A `WriteConcern` requesting [`Acknowledgment::Majority`].
    pub fn majority() -> Self {
        Acknowledgment::Majority.into()
    }

    /// A `WriteConcern` with a custom acknowledgment.
    pub fn custom(s: impl AsRef<str>) -> Self {
        Acknowledgment::from(s.as_ref()).into()
    }

    /// A `WriteConcern` with `w: 0`.
    pub fn unacknowledged() -> Self {
        Self::nodes(0)
    }

    /// A `WriteConcern` with nothing specified.
    pub fn server_default() -> Self {
        Self::default()
    }

    /// The requested acknowledgement.
    pub fn w(&self) -> &TriState<Acknowledgment> {
        &self.w
    }

    /// The write concern timeout in milliseconds.
    pub fn w_timeout_millis(&self) -> TriState<i64> {
        self.w_timeout
    }

    /// The write concern timeout, if one was specified and is representable as a `Duration`.
    pub fn w_timeout(&self) -> Option<Duration> {
        self.w_timeout
            .into_option()
            .and_then(|millis| u64::try_from(millis).ok())
            .map(Duration::from_millis)
    }

    /// Whether acknowledgement from the on-disk journal was requested.
    pub fn journal(&self) -> TriState<bool> {
        self.journal
    }

    /// Whether the server will acknowledge writes made with this write concern. Everything is
    /// acknowledged except an explicit `w: 0`; the default acknowledgement level is never "none".
    pub fn is_acknowledged(&self) -> bool {
        !self.w.is_present_and_eq(&Acknowledgment::Nodes(0))
    }

    /// Whether the write concern was created with no values specified. If true, the write concern
    /// should be considered the server's default and encodes to an empty document.
    pub fn is_server_default(&self) -> bool {
        self.w.is_absent() && self.w_timeout.is_absent() && self.journal.is_absent()
    }

    /// Validates the write concern. The first failing rule is reported:
    ///
    /// 1. `w` must not be a negative number.
    /// 2. `wtimeout` must not be negative.
    /// 3. `w: 0` cannot be combined with `j: true`.
    ///
    /// Nothing else is checked. In particular a timeout without `w` is accepted, since it
    /// qualifies whatever acknowledgement the server ends up using.
    pub fn validate(&self) -> Result<()> {
        let result = self.check_rules();
        if let Err(ref error) = result {
            tracing::debug!(
                target: CONCERN_TRACING_EVENT_TARGET,
                error = error.tracing_representation(),
                "write concern failed validation",
            );
        }
        result
    }

    fn check_rules(&self) -> Result<()> {
        if let TriState::Present(Acknowledgment::Nodes(w)) = self.w {
            if w < 0 {
                return Err(Error::validation("w", "negative w"));
            }
        }

        if let TriState::Present(w_timeout) = self.w_timeout {
            if w_timeout < 0 {
                return Err(Error::validation("wtimeout", "negative wtimeout"));
            }
        }

        if self.w.is_present_and_eq(&Acknowledgment::Nodes(0))
            && self.journal.is_present_and_eq(&true)
        {
            return Err(Error::validation(
                "j",
                "unacknowledged with journal requested",
            ));
        }

        Ok(())
    }

    /// Returns `fallback` if this write concern is the server default, and a copy of this write
    /// concern otherwise. Fields are never merged: a write concern that specifies anything
    /// replaces the fallback wholesale.
    pub fn inherit_from(&self, fallback: &WriteConcern) -> WriteConcern {
        if self.is_server_default() {
            fallback.clone()
        } else {
            self.clone()
        }
    }

    /// Appends this write concern to `command` as its `writeConcern` field. Nothing is appended
    /// for the server default, and an invalid write concern is an error.
    pub fn append_to_command(&self, command: &mut Document) -> Result<()> {
        let document = self.to_document()?;
        if !document.is_empty() {
            command.insert("writeConcern", document);
        }
        Ok(())
    }
}

impl From<Acknowledgment> for WriteConcern {
    fn from(w: Acknowledgment) -> Self {
        WriteConcern {
            w: TriState::set(w),
            w_timeout: TriState::Absent,
            journal: TriState::Absent,
        }
    }
}

/// Resolves the write concern in effect for an operation from the most specific level to the
/// least specific one (for example: operation, collection, database, client). The first level
/// that sets a non-default write concern wins; if none does, the server default is used.
pub fn resolve_write_concern<'a>(
    levels: impl IntoIterator<Item = Option<&'a WriteConcern>>,
) -> WriteConcern {
    levels
        .into_iter()
        .flatten()
        .fold(WriteConcern::server_default(), |resolved, level| {
            resolved.inherit_from(level)
        })
}

/// Resolves the read concern in effect for an operation from the most specific level to the
/// least specific one. See [`resolve_write_concern`].
pub fn resolve_read_concern<'a>(
    levels: impl IntoIterator<Item = Option<&'a ReadConcern>>,
) -> ReadConcern {
    levels
        .into_iter()
        .flatten()
        .fold(ReadConcern::server_default(), |resolved, level| {
            resolved.inherit_from(level)
        })
}
