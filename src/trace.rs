use crate::bson::{Bson, Document};

pub(crate) const CONCERN_TRACING_EVENT_TARGET: &str = "mongodb_concern::concern";
pub(crate) const GRIDFS_TRACING_EVENT_TARGET: &str = "mongodb_concern::gridfs";

pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

impl TracingRepresentation for Document {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        Bson::Document(self.clone())
            .into_relaxed_extjson()
            .to_string()
    }
}

impl TracingRepresentation for Bson {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.clone().into_relaxed_extjson().to_string()
    }
}

impl TracingRepresentation for crate::error::Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

impl TracingRepresentation for crate::concern::WriteConcern {
    type Representation = String;

    // Invalid write concerns have no canonical document, so fall back to the debug form.
    fn tracing_representation(&self) -> String {
        match self.to_document() {
            Ok(document) => document.tracing_representation(),
            Err(_) => format!("{:?}", self),
        }
    }
}

impl TracingRepresentation for crate::concern::ReadConcern {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        match self.to_document() {
            Ok(document) => document.tracing_representation(),
            Err(_) => format!("{:?}", self),
        }
    }
}
