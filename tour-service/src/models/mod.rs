//! Resource models
//!
//! Each entity is a zero-sized type implementing [`Resource`]: the collection
//! it lives in, the rules a document must satisfy, the read decorators applied
//! to every query and the relations populated on the way out.
//!
//! ```text
//! create   payload -> writable fields -> normalize -> defaults -> validate -> insert
//! update   changes -> writable fields -> normalize -> validate(current + changes) -> update
//! read     decorate() AND request filter -> populate() -> present()
//! ```

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::auth::PasswordHasher;
use crate::error::Result;
use crate::ids::new_document_id;
use crate::repository::{Document, DocumentStore, Filter, Projection, ID_FIELD, VERSION_FIELD};

mod booking;
mod review;
mod tour;
mod user;
mod validate;

pub use booking::Booking;
pub use review::{rating_summary, Review};
pub use tour::{slugify, Tour};
pub use user::{Role, User};
pub use validate::{is_email, Validator};

/// Collaborators available while preparing a write
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    /// Password hasher for credential fields
    pub hasher: &'a PasswordHasher,
    /// Timestamp used for server-assigned dates
    pub now: DateTime<Utc>,
}

impl<'a> WriteContext<'a> {
    /// Context stamped with the current time
    pub fn new(hasher: &'a PasswordHasher) -> Self {
        Self {
            hasher,
            now: Utc::now(),
        }
    }

    /// `now` in the stored date format
    pub fn timestamp(&self) -> String {
        format_timestamp(self.now)
    }
}

/// Render a date the way documents store it: RFC 3339, UTC, milliseconds
///
/// Stored dates sort lexicographically in time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored date
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A document model stored in one collection
pub trait Resource: Send + Sync + 'static {
    /// Singular name, used as the envelope key and in messages
    const SINGULAR: &'static str;

    /// Collection name, used as the list envelope key
    const COLLECTION: &'static str;

    /// TypeID prefix for new documents
    const ID_PREFIX: &'static str;

    /// Fields a client may write; anything else in a payload is dropped
    const FIELDS: &'static [&'static str];

    /// Fields backed by a unique index
    const UNIQUE: &'static [&'static str] = &[];

    /// Fields never returned to clients
    const HIDDEN: &'static [&'static str] = &[];

    /// Canonicalize client input in place (trim, lower-case, derive)
    fn normalize(_doc: &mut Document) {}

    /// Fill defaults on a new document
    fn defaults(_doc: &mut Document, _ctx: &WriteContext<'_>) {}

    /// Check every field rule against a complete document
    fn validate(doc: &Document) -> Result<()>;

    /// Turn a create payload into the document to insert
    fn prepare_create(payload: Document, ctx: &WriteContext<'_>) -> Result<Document> {
        let mut doc = writable_fields(payload, Self::FIELDS);
        Self::normalize(&mut doc);
        Self::defaults(&mut doc, ctx);
        Self::validate(&doc)?;
        doc.insert(ID_FIELD.to_string(), Value::String(new_document_id(Self::ID_PREFIX)));
        Ok(doc)
    }

    /// Turn an update payload into the changes to apply
    ///
    /// The merged document is validated as a whole.
    fn prepare_update(
        current: &Document,
        changes: Document,
        _ctx: &WriteContext<'_>,
    ) -> Result<Document> {
        let mut changes = writable_fields(changes, Self::FIELDS);
        Self::normalize(&mut changes);
        Self::validate(&merge_changes(current, &changes))?;
        Ok(changes)
    }

    /// Reject a new document that conflicts with stored ones
    fn check_conflicts<S: DocumentStore>(
        _store: &S,
        _doc: &Document,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// React to a stored document having been created, updated or deleted
    fn after_write<S: DocumentStore>(
        _store: &S,
        _doc: &Document,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Filter ANDed into every read
    fn decorate() -> Filter {
        Filter::new()
    }

    /// Relations resolved on every read
    fn populate() -> Vec<Populate> {
        Vec::new()
    }

    /// Shape a stored document for a response
    fn present(doc: Document) -> Document {
        strip_fields(doc, Self::HIDDEN)
    }
}

/// Keep only the allowed fields of a payload
pub fn writable_fields(mut payload: Document, allowed: &[&str]) -> Document {
    payload.retain(|key, _| allowed.contains(&key.as_str()));
    payload
}

/// Remove fields from a document
pub fn strip_fields(mut doc: Document, fields: &[&str]) -> Document {
    for field in fields {
        doc.remove(*field);
    }
    doc
}

/// The document an update would produce; `null` removes a field
pub fn merge_changes(current: &Document, changes: &Document) -> Document {
    let mut merged = current.clone();
    for (key, value) in changes {
        if key == ID_FIELD || key == VERSION_FIELD {
            continue;
        }
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// How a populated relation is found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateKind {
    /// The field holds one id or an array of ids
    Reference {
        /// Field holding the ids
        path: &'static str,
    },
    /// Documents of another collection point back at this one
    Virtual {
        /// Field added to the document
        name: &'static str,
        /// Field in the foreign collection holding this document's id
        foreign_field: &'static str,
    },
}

/// A relation resolved when a document is read
///
/// The target model's decorator, nested relations and presentation all apply
/// to the populated documents.
#[derive(Debug, Clone)]
pub struct Populate {
    /// How related documents are found
    pub kind: PopulateKind,
    /// Collection the related documents live in
    pub collection: &'static str,
    /// Field projection applied to related documents
    pub projection: Option<Projection>,
    /// Target model's read decorator
    pub decorate: fn() -> Filter,
    /// Target model's own relations
    pub nested: fn() -> Vec<Populate>,
    /// Target model's presentation
    pub present: fn(Document) -> Document,
}

impl Populate {
    fn for_model<R: Resource>(kind: PopulateKind) -> Self {
        Self {
            kind,
            collection: R::COLLECTION,
            projection: None,
            decorate: R::decorate,
            nested: R::populate,
            present: R::present,
        }
    }

    /// Replace the id(s) stored in `path` with documents of `R`
    pub fn reference<R: Resource>(path: &'static str) -> Self {
        Self::for_model::<R>(PopulateKind::Reference { path })
    }

    /// Add `name` holding every `R` whose `foreign_field` is this document's id
    pub fn virtual_field<R: Resource>(name: &'static str, foreign_field: &'static str) -> Self {
        Self::for_model::<R>(PopulateKind::Virtual {
            name,
            foreign_field,
        })
    }

    /// Only return these fields of the related documents
    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.projection = Some(Projection::include(fields.iter().copied()));
        self
    }

    /// Drop these fields from the related documents
    #[must_use]
    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.projection = Some(Projection::exclude(fields.iter().copied()));
        self
    }
}

/// Declare the unique indexes of every model
pub async fn register_indexes<S: DocumentStore>(store: &S) -> Result<()> {
    async fn declare<R: Resource, S: DocumentStore>(store: &S) -> Result<()> {
        for field in R::UNIQUE {
            store.ensure_unique(R::COLLECTION, field).await?;
        }
        Ok(())
    }

    declare::<Tour, S>(store).await?;
    declare::<User, S>(store).await?;
    declare::<Review, S>(store).await?;
    declare::<Booking, S>(store).await?;
    Ok(())
}
