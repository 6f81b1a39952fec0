use crate::id::ElementId;
use thiserror::Error;

/// Failures reported by a rendering engine through the facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine handle has been disposed")]
    Disposed,
    #[error("element {0} is not on the canvas")]
    UnknownElement(ElementId),
    #[error("element id {0} is already in use")]
    DuplicateId(ElementId),
    #[error("element {0} is not editable text")]
    NotText(ElementId),
    #[error("engine rejected the document: {0}")]
    Rejected(String),
}

/// Failures while turning a fetched document tree into elements.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("document tree is not a JSON object")]
    NotAnObject,
    #[error("document tree has no element array (looked for {0})")]
    NoElements(&'static str),
    #[error("element {index} is malformed: {source}")]
    Element {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures decoding an engine event from its wire form.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown engine event `{0}`")]
    UnknownEvent(String),
    #[error("event `{event}` is missing `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
    #[error("event `{event}` has a malformed payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
