//! Dotted-path resolution (§4.1). A numeric step against a sequence is
//! positional; a non-numeric step against a sequence of documents fans
//! out over each element; a sequence with no documents at all yields
//! absent for a non-numeric step; an empty path returns the value itself.

use bson::{Bson, Document};

#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Value(&'a Bson),
    Many(Vec<&'a Bson>),
    Absent,
}

fn as_index(step: &str) -> Option<usize> {
    step.parse::<usize>().ok()
}

/// Resolve a dotted path against a document (§4.1).
pub fn resolve_path<'a>(doc: &'a Document, path: &str) -> Resolved<'a> {
    if path.is_empty() {
        return Resolved::Absent;
    }
    let mut segments = path.split('.');
    let first = segments.next().unwrap();
    match doc.get(first) {
        Some(value) => resolve_rest(value, segments),
        None => Resolved::Absent,
    }
}

fn resolve_rest<'a>(value: &'a Bson, mut segments: std::str::Split<'a, char>) -> Resolved<'a> {
    let Some(step) = segments.next() else {
        return Resolved::Value(value);
    };

    match value {
        Bson::Document(sub) => match sub.get(step) {
            Some(next) => resolve_rest(next, segments),
            None => Resolved::Absent,
        },
        Bson::Array(items) => {
            if let Some(idx) = as_index(step) {
                match items.get(idx) {
                    Some(next) => resolve_rest(next, segments),
                    None => Resolved::Absent,
                }
            } else {
                // Fan out: resolve `step` (and the remaining path) against
                // each document element; non-document elements contribute
                // nothing. A sequence with no document elements resolves
                // to Absent rather than an empty Many.
                let mut out = Vec::new();
                for item in items {
                    if let Bson::Document(sub) = item {
                        match sub.get(step) {
                            Some(next) => match resolve_rest(next, segments.clone()) {
                                Resolved::Value(v) => out.push(v),
                                Resolved::Many(vs) => out.extend(vs),
                                Resolved::Absent => {}
                            },
                            None => {}
                        }
                    }
                }
                if out.is_empty() {
                    Resolved::Absent
                } else if out.len() == 1 {
                    Resolved::Value(out[0])
                } else {
                    Resolved::Many(out)
                }
            }
        }
        _ => Resolved::Absent,
    }
}

/// Set a value at a dotted path, auto-vivifying intermediate documents.
/// Numeric steps are not auto-vivified into arrays — only plain document
/// nesting is created along the way, matching the owning-variant scope of
/// §4.1 (array element assignment by update operators goes through their
/// own array-specific logic, not this general setter).
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(l) => l,
        None => return,
    };

    let mut current = doc;
    for seg in segments {
        let entry = current
            .entry(seg.to_string())
            .or_insert_with(|| Bson::Document(Document::new()));
        if !matches!(entry, Bson::Document(_)) {
            *entry = Bson::Document(Document::new());
        }
        current = entry.as_document_mut().unwrap();
    }
    current.insert(last.to_string(), value);
}

/// Unset a value at a dotted path. No-ops if any intermediate segment is
/// missing or not a document.
pub fn unset_path(doc: &mut Document, path: &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(l) => l,
        None => return,
    };

    let mut current = doc;
    for seg in segments {
        match current.get_mut(seg) {
            Some(Bson::Document(sub)) => current = sub,
            _ => return,
        }
    }
    current.remove(last);
}
