//! Canonical document encoding and decoding for read and write concerns.
//!
//! Encoding emits only the fields that were explicitly specified, in the fixed order `w`,
//! `wtimeout`, `j`. Whether a field is emitted depends on its presence alone, never on whether
//! its value is falsy: `j: false` and `w: 0` are always written out.
//!
//! Decoding is strict. It is meant for checking fixture documents against the model, so any
//! field the model doesn't know is an error rather than something to skip.

use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use super::{Acknowledgment, ReadConcern, ReadConcernLevel, WriteConcern};
use crate::{
    bson::{Bson, Document},
    bson_util::get_int,
    error::{Error, ErrorKind, Result},
    tri_state::TriState,
};

impl WriteConcern {
    /// Encodes this write concern into its canonical document. The server default encodes to an
    /// empty document; a write concern that fails [`WriteConcern::validate`] cannot be encoded
    /// and returns an [`ErrorKind::EmptyOrInvalidConcern`] error.
    pub fn to_document(&self) -> Result<Document> {
        self.validate().map_err(|error| ErrorKind::EmptyOrInvalidConcern {
            message: error.to_string(),
        })?;

        let mut document = Document::new();
        if let TriState::Present(ref w) = self.w {
            document.insert("w", w_to_bson(w));
        }
        if let TriState::Present(w_timeout) = self.w_timeout {
            document.insert("wtimeout", millis_to_bson(w_timeout));
        }
        if let TriState::Present(journal) = self.journal {
            document.insert("j", journal);
        }
        Ok(document)
    }

    /// Encodes this write concern into the raw bytes of its canonical document.
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_document()?.to_writer(&mut bytes)?;
        Ok(bytes)
    }

    /// Decodes a write concern from a document. The wire field names `w`, `wtimeout` and `j` are
    /// accepted, as are the option spellings `wtimeoutMS` and `journal`. The result is not
    /// validated.
    pub fn from_document(document: &Document) -> Result<Self> {
        let mut write_concern = WriteConcern::default();

        for (key, value) in document {
            match key.as_str() {
                "w" => {
                    write_concern.w = TriState::set(w_from_bson(value)?);
                }
                "wtimeout" | "wtimeoutMS" => {
                    if write_concern.w_timeout.is_present() {
                        return Err(duplicate_field_error("wtimeout"));
                    }
                    let millis = get_int(value)
                        .ok_or_else(|| wrong_type_error("wtimeout", "an integer", value))?;
                    write_concern.w_timeout = TriState::set(millis);
                }
                "j" | "journal" => {
                    if write_concern.journal.is_present() {
                        return Err(duplicate_field_error("j"));
                    }
                    let journal = value
                        .as_bool()
                        .ok_or_else(|| wrong_type_error("j", "a boolean", value))?;
                    write_concern.journal = TriState::set(journal);
                }
                other => return Err(Error::unrecognized_field(other)),
            }
        }

        Ok(write_concern)
    }
}

impl ReadConcern {
    /// Encodes this read concern into its canonical document: `{ level: <level> }`, or an empty
    /// document for the server default.
    pub fn to_document(&self) -> Result<Document> {
        self.validate()?;

        let mut document = Document::new();
        if let TriState::Present(ref level) = self.level {
            document.insert("level", level.as_str());
        }
        Ok(document)
    }

    /// Encodes this read concern into the raw bytes of its canonical document.
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_document()?.to_writer(&mut bytes)?;
        Ok(bytes)
    }

    /// Decodes a read concern from a document.
    pub fn from_document(document: &Document) -> Result<Self> {
        let mut read_concern = ReadConcern::default();

        for (key, value) in document {
            match key.as_str() {
                "level" => {
                    let level = value
                        .as_str()
                        .ok_or_else(|| wrong_type_error("level", "a string", value))?;
                    read_concern.level = TriState::set(ReadConcernLevel::from_str(level));
                }
                other => return Err(Error::unrecognized_field(other)),
            }
        }

        Ok(read_concern)
    }
}

impl Serialize for WriteConcern {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_document()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WriteConcern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let document = Document::deserialize(deserializer)?;
        Self::from_document(&document).map_err(D::Error::custom)
    }
}

impl Serialize for ReadConcern {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_document()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReadConcern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let document = Document::deserialize(deserializer)?;
        Self::from_document(&document).map_err(D::Error::custom)
    }
}

fn w_to_bson(w: &Acknowledgment) -> Bson {
    match w {
        Acknowledgment::Nodes(n) => Bson::Int32(*n),
        Acknowledgment::Majority => Bson::String("majority".to_string()),
        Acknowledgment::Custom(tag) => Bson::String(tag.clone()),
    }
}

fn w_from_bson(value: &Bson) -> Result<Acknowledgment> {
    if let Bson::String(tag) = value {
        return Ok(Acknowledgment::from(tag.as_str()));
    }
    let n = get_int(value).ok_or_else(|| wrong_type_error("w", "an integer or a string", value))?;
    i32::try_from(n)
        .map(Acknowledgment::Nodes)
        .map_err(|_| wrong_type_error("w", "a 32-bit integer", value))
}

/// Millisecond counts are written as an int32 when they fit and as an int64 otherwise.
fn millis_to_bson(millis: i64) -> Bson {
    match i32::try_from(millis) {
        Ok(millis) => Bson::Int32(millis),
        Err(_) => Bson::Int64(millis),
    }
}

fn wrong_type_error(field: &str, expected: &str, actual: &Bson) -> Error {
    Error::invalid_argument(format!(
        "concern field `{}` must be {}, got {:?}",
        field,
        expected,
        actual.element_type()
    ))
}

fn duplicate_field_error(field: &str) -> Error {
    Error::invalid_argument(format!("concern field `{}` was specified more than once", field))
}
