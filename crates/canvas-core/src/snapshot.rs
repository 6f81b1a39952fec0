//! Immutable serialized copies of a document.

use crate::model::Document;
use std::fmt;
use std::rc::Rc;

/// A fully serialized document at one instant, tagged with its top-level
/// element count. Cloning shares the underlying text.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    json: Rc<str>,
    element_count: usize,
}

impl Snapshot {
    /// Serialize `document` into a snapshot.
    pub fn capture(document: &Document) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(document)?;
        Ok(Self {
            json: json.into(),
            element_count: document.element_count(),
        })
    }

    /// Build a snapshot from already-serialized text, counting its elements.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: Document = serde_json::from_str(json)?;
        Ok(Self {
            json: json.into(),
            element_count: document.element_count(),
        })
    }

    /// Parse the snapshot back into a document.
    pub fn document(&self) -> Result<Document, serde_json::Error> {
        serde_json::from_str(&self.json)
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    /// Shared handle to the serialized text, for consumers that outlive the log.
    pub fn shared_json(&self) -> Rc<str> {
        Rc::clone(&self.json)
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// A snapshot with no elements is never a legitimate revision.
    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Byte-level equality of the serialized forms.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.json == other.json
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("elements", &self.element_count)
            .field("bytes", &self.json.len())
            .finish()
    }
}
