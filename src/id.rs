//! Composite document identifiers.
//!
//! A full identifier is `<collection>/<part>|<part>|...`. Both separators are
//! reserved: neither may appear inside the collection name or any part, which
//! keeps [`build_id`] and [`decompose_id`] exact inverses.
//!
//! Empty parts are allowed, except that RavenDB refuses to store an id whose
//! last part is empty: it treats a trailing `|` as a request for a
//! server-assigned identity.

use crate::error::{Result, StoreError};

/// Separates the collection name from the identifier parts.
pub const COLLECTION_SEPARATOR: char = '/';

/// Separates individual identifier parts.
pub const PART_SEPARATOR: char = '|';

fn is_reserved(c: char) -> bool {
    c == COLLECTION_SEPARATOR || c == PART_SEPARATOR
}

fn check_collection(collection: &str) -> Result<()> {
    if collection.is_empty() {
        return Err(StoreError::malformed(collection, "collection name is empty"));
    }
    if collection.contains(is_reserved) {
        return Err(StoreError::malformed(
            collection,
            "collection name contains a reserved separator",
        ));
    }
    Ok(())
}

fn check_parts<S: AsRef<str>>(collection: &str, parts: &[S]) -> Result<()> {
    for part in parts {
        let part = part.as_ref();
        if part.contains(is_reserved) {
            return Err(StoreError::malformed(
                format!("{}{}{}", collection, COLLECTION_SEPARATOR, part),
                format!("identifier part {:?} contains a reserved separator", part),
            ));
        }
    }
    Ok(())
}

fn join_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut joined = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            joined.push(PART_SEPARATOR);
        }
        joined.push_str(part.as_ref());
    }
    joined
}

/// Build the full identifier of a document.
pub fn build_id<S: AsRef<str>>(collection: &str, parts: &[S]) -> Result<String> {
    check_collection(collection)?;
    if parts.is_empty() {
        return Err(StoreError::malformed(
            collection,
            "at least one identifier part is required",
        ));
    }
    check_parts(collection, parts)?;

    Ok(format!(
        "{}{}{}",
        collection,
        COLLECTION_SEPARATOR,
        join_parts(parts)
    ))
}

/// Split a full identifier back into its collection and parts.
pub fn decompose_id(id: &str) -> Result<(String, Vec<String>)> {
    let (collection, rest) = id
        .split_once(COLLECTION_SEPARATOR)
        .ok_or_else(|| StoreError::malformed(id, "missing collection separator"))?;

    if collection.is_empty() {
        return Err(StoreError::malformed(id, "collection name is empty"));
    }
    if rest.contains(COLLECTION_SEPARATOR) {
        return Err(StoreError::malformed(
            id,
            "collection separator appears more than once",
        ));
    }

    let parts = rest.split(PART_SEPARATOR).map(str::to_string).collect();
    Ok((collection.to_string(), parts))
}

/// Build the key shared by every identifier that starts with `leading_parts`.
///
/// With no parts this is the collection prefix; otherwise the key ends with a
/// part separator so that `guild1` never matches `guild10`. Use
/// [`matches_partial_id`] to test a full identifier against it.
pub fn build_partial_id<S: AsRef<str>>(collection: &str, leading_parts: &[S]) -> Result<String> {
    check_collection(collection)?;
    check_parts(collection, leading_parts)?;

    let mut key = format!("{}{}", collection, COLLECTION_SEPARATOR);
    if !leading_parts.is_empty() {
        key.push_str(&join_parts(leading_parts));
        key.push(PART_SEPARATOR);
    }
    Ok(key)
}

/// Whether the full identifier `id` is covered by a partial identifier.
pub fn matches_partial_id(id: &str, partial: &str) -> bool {
    if id.starts_with(partial) {
        return true;
    }
    // All parts given: the full id has no trailing separator.
    partial
        .strip_suffix(PART_SEPARATOR)
        .is_some_and(|exact| exact == id)
}

/// The collection named by a full identifier.
pub fn collection_of(id: &str) -> Result<String> {
    decompose_id(id).map(|(collection, _)| collection)
}
