/// A single sort key and direction, as used by both `find` sort options and
/// `$push`'s `$sort` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_i32(n: i32) -> Option<Self> {
        match n {
            1 => Some(SortDirection::Ascending),
            -1 => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub path: String,
    pub direction: SortDirection,
}

/// An ordered list of sort keys (§4.6 sort stage). Ties within an equal key
/// prefix fall through to subsequent keys in order.
#[derive(Debug, Clone, Default)]
pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Sort {
    pub fn parse(doc: &bson::Document) -> Result<Self, String> {
        let mut keys = Vec::with_capacity(doc.len());
        for (path, value) in doc.iter() {
            let n = value
                .as_i32()
                .or_else(|| value.as_i64().map(|n| n as i32))
                .ok_or_else(|| format!("sort direction for {path} must be 1 or -1"))?;
            let direction = SortDirection::from_i32(n)
                .ok_or_else(|| format!("sort direction for {path} must be 1 or -1"))?;
            keys.push(SortKey {
                path: path.clone(),
                direction,
            });
        }
        Ok(Sort { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
