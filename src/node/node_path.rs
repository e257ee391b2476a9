use derive_more::Display;

/// The path of a node in a hierarchy.
///
/// Paths are `/`-separated and always held in canonical form: a leading `/`,
/// no repeated separators, and no trailing separator.
/// The root path is `/`.
/// Construction normalises rather than rejects, so `a//b/` and `/a/b` name
/// the same node.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

impl NodePath {
    /// Create a new node path from `path`, normalising separators.
    #[must_use]
    pub fn new(path: &str) -> Self {
        let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if components.is_empty() {
            Self::root()
        } else {
            Self(format!("/{}", components.join("/")))
        }
    }

    /// The root node path.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice of the underlying path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Indicates if this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the name of the node: the final path component, or an empty
    /// string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_root() {
            ""
        } else {
            self.0.rsplit('/').next().unwrap_or("")
        }
    }

    /// Returns the path of the parent node, or [`None`] for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            match self.0.rsplit_once('/') {
                Some(("", _)) => Some(Self::root()),
                Some((parent, _)) => Some(Self(parent.to_string())),
                None => None,
            }
        }
    }

    /// Returns the path of a child of this node named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{name}", self.0))
        }
    }

    /// Returns the `/`-separated name components of the path, outermost
    /// first. The root has no components.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|name| !name.is_empty())
    }

    /// Returns the ancestor paths from the root (exclusive) to this path
    /// (exclusive), shortest first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut ancestors = Vec::new();
        let mut parent = self.parent();
        while let Some(path) = parent {
            if path.is_root() {
                break;
            }
            parent = path.parent();
            ancestors.push(path);
        }
        ancestors.reverse();
        ancestors
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path_normalisation() {
        assert_eq!(NodePath::new("/a/b").as_str(), "/a/b");
        assert_eq!(NodePath::new("a//b/").as_str(), "/a/b");
        assert_eq!(NodePath::new("").as_str(), "/");
        assert_eq!(NodePath::new("///").as_str(), "/");
    }

    #[test]
    fn node_path_relations() {
        let path = NodePath::new("/a/b/c");
        assert_eq!(path.name(), "c");
        assert_eq!(path.parent().unwrap().as_str(), "/a/b");
        assert_eq!(
            path.ancestors(),
            vec![NodePath::new("/a"), NodePath::new("/a/b")]
        );
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(NodePath::new("/a").parent().unwrap(), NodePath::root());
        assert_eq!(NodePath::root().child("a").as_str(), "/a");
        assert_eq!(NodePath::new("/a").child("b/c").as_str(), "/a/b/c");
    }
}
