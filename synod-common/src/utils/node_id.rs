use serde::{Deserialize, Serialize};

/// Human readable name of a node in the static peer table (`node-a`, ...).
///
/// Serialized as a bare string so config files stay hand-editable.
#[derive(Default, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    /// Example:
    /// ```rust
    /// use synod_common::NodeId;
    /// let id: NodeId = "node-a".into();
    /// assert_eq!(id.as_str(), "node-a");
    /// ```
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}
