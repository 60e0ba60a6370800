//! Deterministic document identity.
//!
//! Identifiers are version-5 UUIDs in the DNS namespace over `name + content`,
//! the same derivation Weaviate's client utilities use (`generate_uuid5`), so
//! re-ingesting an unchanged file addresses the object it wrote last time.

use uuid::Uuid;

/// Derives the store identifier for a file name and its extracted text.
pub fn document_id(name: &str, content: &str) -> Uuid {
    let mut key = String::with_capacity(name.len() + content.len());
    key.push_str(name);
    key.push_str(content);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes())
}
