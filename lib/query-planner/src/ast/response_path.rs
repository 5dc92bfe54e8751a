use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const LIST_SEGMENT: &str = "@";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Response key of a field.
    Field(String),
    /// Every item of the list at this position.
    List,
}

/// Location in the response tree where a fetch reads its representations
/// from and writes its results to. Printed as `topProducts.@.reviews`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponsePath {
    segments: Vec<PathSegment>,
}

impl ResponsePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push_field(&mut self, response_key: impl Into<String>) {
        self.segments.push(PathSegment::Field(response_key.into()));
    }

    pub fn push_list(&mut self) {
        self.segments.push(PathSegment::List);
    }

    pub fn has_list(&self) -> bool {
        self.segments.contains(&PathSegment::List)
    }
}

impl Display for ResponsePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(key) => f.write_str(key)?,
                PathSegment::List => f.write_str(LIST_SEGMENT)?,
            }
        }

        Ok(())
    }
}

impl From<&str> for ResponsePath {
    fn from(value: &str) -> Self {
        let segments = value
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                LIST_SEGMENT => PathSegment::List,
                key => PathSegment::Field(key.to_string()),
            })
            .collect();

        Self { segments }
    }
}

impl Serialize for ResponsePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResponsePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ResponsePath::from(raw.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::ResponsePath;

    #[test]
    fn prints_list_segments() {
        let mut path = ResponsePath::root();
        path.push_field("topProducts");
        path.push_list();
        path.push_field("reviews");

        assert_eq!(path.to_string(), "topProducts.@.reviews");
        assert!(path.has_list());
        assert_eq!(ResponsePath::from("topProducts.@.reviews"), path);
        assert_eq!(ResponsePath::root().to_string(), "");
    }
}
