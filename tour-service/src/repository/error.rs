//! Repository error types
//!
//! This module provides structured error types for document store operations,
//! allowing fine-grained error handling and meaningful error messages.
//!
//! # Example
//!
//! ```rust
//! use tour_service::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("tours", "tour_01h455vb4pex5vsknk084sn02q");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.document_id.is_some());
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single document by ID
    FindById,
    /// Finding documents matching a query
    Find,
    /// Counting documents matching a filter
    Count,
    /// Inserting a new document
    Insert,
    /// Updating an existing document
    Update,
    /// Deleting a document
    Delete,
    /// Declaring a unique index
    Index,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindById => write!(f, "find_by_id"),
            Self::Find => write!(f, "find"),
            Self::Count => write!(f, "count"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Document was not found
    NotFound,
    /// A unique field already holds the value
    DuplicateKey,
    /// Document shape is unusable (missing identifier, not an object)
    InvalidDocument,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::InvalidDocument => write!(f, "invalid_document"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// Records what operation failed, why it failed, and which collection and
/// document were involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,

    /// The category of error
    pub kind: RepositoryErrorKind,

    /// Human-readable error message
    pub message: String,

    /// The collection involved
    pub collection: Option<String>,

    /// The ID of the document involved
    pub document_id: Option<String>,

    /// For duplicate keys: the offending field and value
    pub duplicate: Option<(String, String)>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            collection: None,
            document_id: None,
            duplicate: None,
        }
    }

    /// Create a "not found" error with document context
    pub fn not_found(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::FindById,
            RepositoryErrorKind::NotFound,
            "Document not found",
        )
        .with_document(collection, document_id)
    }

    /// Create a duplicate key error for a unique field
    ///
    /// # Example
    ///
    /// ```rust
    /// use tour_service::repository::{RepositoryError, RepositoryOperation};
    ///
    /// let error = RepositoryError::duplicate_key(RepositoryOperation::Insert, "email", "a@b.io");
    /// assert_eq!(error.duplicate, Some(("email".to_string(), "a@b.io".to_string())));
    /// ```
    pub fn duplicate_key(
        operation: RepositoryOperation,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let value = value.into();
        let mut error = Self::new(
            operation,
            RepositoryErrorKind::DuplicateKey,
            format!("E11000 duplicate key: {{ {}: {:?} }}", field, value),
        );
        error.duplicate = Some((field, value));
        error
    }

    /// Create an invalid document error
    pub fn invalid_document(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::InvalidDocument, message)
    }

    /// Add collection and document context
    #[must_use]
    pub fn with_document(
        mut self,
        collection: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        self.collection = Some(collection.into());
        self.document_id = Some(document_id.into());
        self
    }

    /// Change the operation context
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;

        if let (Some(collection), Some(document_id)) = (&self.collection, &self.document_id) {
            write!(f, " [{}: {}]", collection, document_id)?;
        }

        Ok(())
    }
}

impl std::error::Error for RepositoryError {}
