//! Boundary with the document model.
//!
//! Documents and document updates cross the wire as opaque blobs. The codec
//! only frames them with a length prefix; producing and reading the blob is
//! the job of a [`DocumentTypeRepo`] supplied by the document layer.

use crate::types::{DocumentError, DocumentId};
use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;
use storage_wire::{WireReader, WireWrite};

/// A document as seen by the storage protocol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    id: DocumentId,
    body: Bytes,
}

impl Document {
    /// Create a document from its id and serialized field content
    pub fn new(id: DocumentId, body: Bytes) -> Self {
        Self { id, body }
    }

    /// Document id
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Document type name
    pub fn doc_type(&self) -> &str {
        self.id.doc_type()
    }

    /// Serialized field content
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({}, {} bytes)", self.id, self.body.len())
    }
}

/// A partial update of one document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentUpdate {
    id: DocumentId,
    operations: Bytes,
}

impl DocumentUpdate {
    /// Create an update from the target id and its serialized operations
    pub fn new(id: DocumentId, operations: Bytes) -> Self {
        Self { id, operations }
    }

    /// Id of the updated document
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Serialized field update operations
    pub fn operations(&self) -> &Bytes {
        &self.operations
    }
}

impl fmt::Display for DocumentUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentUpdate({}, {} bytes)", self.id, self.operations.len())
    }
}

/// Serializer pair supplied by the document layer.
///
/// `*_size` must return exactly the number of bytes the matching `write_*`
/// produces; the codec uses it for the length prefix and for size-only
/// encoding passes.
pub trait DocumentTypeRepo: Send + Sync + fmt::Debug {
    /// Serialized size of a document
    fn document_size(&self, doc: &Document) -> usize;

    /// Serialize a document
    fn write_document(&self, doc: &Document, out: &mut dyn WireWrite);

    /// Deserialize a document from its blob
    fn read_document(&self, blob: Bytes) -> Result<Document, DocumentError>;

    /// Serialized size of an update
    fn update_size(&self, update: &DocumentUpdate) -> usize;

    /// Serialize an update
    fn write_update(&self, update: &DocumentUpdate, out: &mut dyn WireWrite);

    /// Deserialize an update from its blob
    fn read_update(&self, blob: Bytes) -> Result<DocumentUpdate, DocumentError>;
}

/// Type repository that knows document types by name.
///
/// Blob layout: id string followed by the body as a length-prefixed blob.
/// Documents of unregistered types are rejected on read.
#[derive(Debug, Clone, Default)]
pub struct BasicTypeRepo {
    types: HashSet<String>,
}

impl BasicTypeRepo {
    /// Repository with the given document types
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Register another document type
    pub fn add_type(&mut self, name: impl Into<String>) {
        self.types.insert(name.into());
    }

    /// Whether a type is registered
    pub fn knows(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    fn blob_size(id: &DocumentId, payload: &Bytes) -> usize {
        4 + id.as_str().len() + 4 + payload.len()
    }

    fn read_blob(&self, blob: Bytes) -> Result<(DocumentId, Bytes), DocumentError> {
        let mut reader = WireReader::new(blob);
        let corrupt = |e: storage_wire::DecodeError| DocumentError::Corrupt(e.to_string());
        let id = DocumentId::parse(reader.read_string().map_err(corrupt)?)?;
        if !self.knows(id.doc_type()) {
            return Err(DocumentError::UnknownType(id.doc_type().to_string()));
        }
        let payload = reader.read_bytes().map_err(corrupt)?;
        reader.finish().map_err(corrupt)?;
        Ok((id, payload))
    }
}

impl DocumentTypeRepo for BasicTypeRepo {
    fn document_size(&self, doc: &Document) -> usize {
        Self::blob_size(&doc.id, &doc.body)
    }

    fn write_document(&self, doc: &Document, out: &mut dyn WireWrite) {
        out.write_string(doc.id.as_str());
        out.write_bytes(&doc.body);
    }

    fn read_document(&self, blob: Bytes) -> Result<Document, DocumentError> {
        let (id, body) = self.read_blob(blob)?;
        Ok(Document::new(id, body))
    }

    fn update_size(&self, update: &DocumentUpdate) -> usize {
        Self::blob_size(&update.id, &update.operations)
    }

    fn write_update(&self, update: &DocumentUpdate, out: &mut dyn WireWrite) {
        out.write_string(update.id.as_str());
        out.write_bytes(&update.operations);
    }

    fn read_update(&self, blob: Bytes) -> Result<DocumentUpdate, DocumentError> {
        let (id, operations) = self.read_blob(blob)?;
        Ok(DocumentUpdate::new(id, operations))
    }
}
