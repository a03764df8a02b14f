use crate::{error::DecodeError, wire::TreeValue};
use serde_json::Map;

///
/// Cursor
///
/// Position inside a tree value together with its dotted path, so every
/// decode error can name the exact sub-value it refers to.
///

#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    node: &'a TreeValue,
    path: String,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub const fn root(node: &'a TreeValue) -> Self {
        Self {
            node,
            path: String::new(),
        }
    }

    #[must_use]
    pub const fn node(&self) -> &'a TreeValue {
        self.node
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Child under `key`, null or not; `None` only when the key is absent.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<Self> {
        self.node.get(key).map(|node| self.child(node, key))
    }

    /// Child at `index` of an array node.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<Self> {
        self.node
            .get(index)
            .map(|node| self.child(node, &index.to_string()))
    }

    /// Child cursor for a node obtained from this one.
    #[must_use]
    pub fn child(&self, node: &'a TreeValue, segment: &str) -> Self {
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{segment}", self.path)
        };

        Self { node, path }
    }

    /// Object view of the node, or an `invalid_field` error.
    pub fn object(&self) -> Result<&'a Map<String, TreeValue>, DecodeError> {
        self.node
            .as_object()
            .ok_or_else(|| self.invalid(format!("Expected an object at {}", self.display_path())))
    }

    /// Array view of the node, or an `invalid_field` error.
    pub fn array(&self) -> Result<&'a Vec<TreeValue>, DecodeError> {
        self.node
            .as_array()
            .ok_or_else(|| self.invalid(format!("Expected an array at {}", self.display_path())))
    }

    #[must_use]
    pub fn error(&self, code: &str, message: impl Into<String>) -> DecodeError {
        DecodeError::new(code, message, self.path.clone())
    }

    #[must_use]
    pub fn invalid(&self, message: impl Into<String>) -> DecodeError {
        self.error(DecodeError::INVALID_FIELD, message)
    }

    /// Path as shown in messages; the root reads as `<root>`.
    #[must_use]
    pub fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_are_dotted() {
        let tree = json!({ "friends": [{ "name": 1 }] });
        let root = Cursor::root(&tree);
        let name = root
            .field("friends")
            .and_then(|c| c.index(0))
            .and_then(|c| c.field("name"))
            .unwrap();

        assert_eq!(name.path(), "friends.0.name");
        assert_eq!(name.node(), &json!(1));
    }

    #[test]
    fn shape_errors_name_the_path() {
        let tree = json!({ "a": 1 });
        let err = Cursor::root(&tree).field("a").unwrap().object().unwrap_err();

        assert_eq!(err.code, "invalid_field");
        assert_eq!(err.path, "a");
        assert_eq!(err.message, "Expected an object at a");
    }
}
