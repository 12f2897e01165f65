use std::fmt;

/// Stable numeric id of a catalog entity.
pub type Guid = u64;

/// Identifier of a node (observable, computed or subscription) in a reactive runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic ID generator for the nodes of one runtime.
/// Ids are never reused, even after a node is removed.
#[derive(Debug)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_sequential_from_one() {
        let mut ids = IdGenerator::default();
        let drawn: Vec<u64> = (0..3).map(|_| ids.next_id().as_u64()).collect();
        assert_eq!(drawn, vec![1, 2, 3]);
        assert_eq!(ids.issued(), 3);
    }

    #[test]
    fn node_id_display_is_hash_prefixed() {
        let mut ids = IdGenerator::new();
        ids.next_id();
        assert_eq!(ids.next_id().to_string(), "#2");
    }
}
