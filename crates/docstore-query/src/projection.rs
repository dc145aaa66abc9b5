use bson::{Bson, Document};

/// Field projection applied last in the `find` pipeline (§4.6). Mongo-style:
/// a projection document is either all-inclusion or all-exclusion (aside
/// from `_id`, which may be excluded alongside an inclusion projection).
#[derive(Debug, Clone)]
pub enum Projection {
    Include { paths: Vec<String>, include_id: bool },
    Exclude { paths: Vec<String> },
}

impl Projection {
    pub fn parse(doc: &Document) -> Result<Self, String> {
        let mut include_id = true;
        let mut saw_include = false;
        let mut saw_exclude = false;
        let mut include_paths = Vec::new();
        let mut exclude_paths = Vec::new();

        for (path, value) in doc.iter() {
            let flag = match value {
                Bson::Boolean(b) => *b,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0,
                other => return Err(format!("projection value for {path} must be boolean/numeric, got {other:?}")),
            };

            if path == "_id" {
                include_id = flag;
                continue;
            }

            if flag {
                saw_include = true;
                include_paths.push(path.clone());
            } else {
                saw_exclude = true;
                exclude_paths.push(path.clone());
            }
        }

        if saw_include && saw_exclude {
            return Err("projection cannot mix inclusion and exclusion (besides _id)".into());
        }

        if saw_exclude {
            Ok(Projection::Exclude { paths: exclude_paths })
        } else {
            Ok(Projection::Include {
                paths: include_paths,
                include_id,
            })
        }
    }

    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::Include { paths, include_id } => {
                let mut out = Document::new();
                if *include_id {
                    if let Some(id) = doc.get("_id") {
                        out.insert("_id", id.clone());
                    }
                }
                for path in paths {
                    if let Some(v) = get_path(doc, path) {
                        insert_path(&mut out, path, v);
                    }
                }
                out
            }
            Projection::Exclude { paths } => {
                let mut out = doc.clone();
                for path in paths {
                    remove_path(&mut out, path);
                }
                out
            }
        }
    }
}

/// Dotted-path lookup (§4.6 "Nested paths are respected"): walks document
/// nesting only, same scope as the rest of this crate's path handling.
fn get_path(doc: &Document, path: &str) -> Option<Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for seg in segments {
        current = current.as_document()?.get(seg)?;
    }
    Some(current.clone())
}

fn insert_path(out: &mut Document, path: &str, value: Bson) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().expect("path has at least one segment");

    let mut current = out;
    for seg in segments {
        let entry = current.entry(seg.to_string()).or_insert_with(|| Bson::Document(Document::new()));
        if !matches!(entry, Bson::Document(_)) {
            *entry = Bson::Document(Document::new());
        }
        current = entry.as_document_mut().unwrap();
    }
    current.insert(last.to_string(), value);
}

fn remove_path(doc: &mut Document, path: &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().expect("path has at least one segment");

    let mut current = doc;
    for seg in segments {
        match current.get_mut(seg) {
            Some(Bson::Document(sub)) => current = sub,
            _ => return,
        }
    }
    current.remove(last);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn inclusion_keeps_id_by_default() {
        let proj = Projection::parse(&doc! { "name": 1 }).unwrap();
        let out = proj.apply(&doc! { "_id": 1, "name": "a", "age": 2 });
        assert_eq!(out, doc! { "_id": 1, "name": "a" });
    }

    #[test]
    fn inclusion_can_drop_id() {
        let proj = Projection::parse(&doc! { "_id": 0, "name": 1 }).unwrap();
        let out = proj.apply(&doc! { "_id": 1, "name": "a" });
        assert_eq!(out, doc! { "name": "a" });
    }

    #[test]
    fn exclusion_drops_named_fields() {
        let proj = Projection::parse(&doc! { "age": 0 }).unwrap();
        let out = proj.apply(&doc! { "_id": 1, "name": "a", "age": 2 });
        assert_eq!(out, doc! { "_id": 1, "name": "a" });
    }

    #[test]
    fn mixed_projection_errors() {
        let err = Projection::parse(&doc! { "name": 1, "age": 0 }).unwrap_err();
        assert!(err.contains("mix"));
    }

    #[test]
    fn inclusion_projects_a_nested_path_without_the_rest_of_its_parent() {
        let proj = Projection::parse(&doc! { "address.city": 1 }).unwrap();
        let out = proj.apply(&doc! { "_id": 1, "address": { "city": "Austin", "zip": "78701" } });
        assert_eq!(out, doc! { "_id": 1, "address": { "city": "Austin" } });
    }

    #[test]
    fn exclusion_drops_only_the_nested_key() {
        let proj = Projection::parse(&doc! { "address.zip": 0 }).unwrap();
        let out = proj.apply(&doc! { "_id": 1, "address": { "city": "Austin", "zip": "78701" } });
        assert_eq!(out, doc! { "_id": 1, "address": { "city": "Austin" } });
    }
}
