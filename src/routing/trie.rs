//! Segment trie used by the method router.
//!
//! # Responsibilities
//! - Store registered patterns one path segment per level
//! - Resolve request segments to the node that terminates a pattern
//! - Enumerate every registered pattern for introspection
//!
//! # Design Decisions
//! - Children keep insertion order; lookup is first-match-wins, not
//!   longest-match. Register literal routes before wildcard routes that share
//!   a prefix if the literal one must take precedence.
//! - A node carries a pattern only when a route ends exactly at its depth.
//! - `*name` matches greedily: once reached, the remaining input is consumed.

use std::fmt;

use crate::routing::error::RouteError;

#[derive(Debug, Default, Clone)]
pub struct Node {
    /// Full pattern of the route ending here, empty for intermediate nodes.
    pattern: String,
    /// Segment this node matches, e.g. `doc`, `:lang` or `*filepath`.
    part: String,
    children: Vec<Node>,
    is_wild: bool,
}

impl Node {
    fn child(part: &str) -> Self {
        Self {
            pattern: String::new(),
            part: part.to_string(),
            children: Vec::new(),
            is_wild: is_wild_segment(part),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn is_wild(&self) -> bool {
        self.is_wild
    }

    /// Insert `pattern` whose parsed segments are `parts`, starting at `depth`.
    ///
    /// Re-inserting a pattern with the same segments overwrites the stored
    /// pattern on the terminal node. A wildcard segment that differs from a
    /// wildcard child already present at the same depth is rejected, since
    /// the second variable name could never be bound at lookup time.
    pub fn insert(&mut self, pattern: &str, parts: &[String], depth: usize) -> Result<(), RouteError> {
        if depth == parts.len() {
            self.pattern = pattern.to_string();
            return Ok(());
        }

        let part = parts[depth].as_str();
        let index = match self.children.iter().position(|c| c.part == part) {
            Some(index) => index,
            None => {
                if is_wild_segment(part) {
                    if let Some(existing) = self.children.iter().find(|c| c.is_wild) {
                        return Err(RouteError::WildcardConflict {
                            pattern: pattern.to_string(),
                            segment: part.to_string(),
                            existing: existing.part.clone(),
                        });
                    }
                }
                self.children.push(Node::child(part));
                self.children.len() - 1
            }
        };

        self.children[index].insert(pattern, parts, depth + 1)
    }

    /// Find the node terminating a pattern that matches `parts`.
    pub fn search(&self, parts: &[&str], depth: usize) -> Option<&Node> {
        if depth == parts.len() || self.part.starts_with('*') {
            return if self.pattern.is_empty() { None } else { Some(self) };
        }

        let part = parts[depth];
        self.children
            .iter()
            .filter(|c| c.part == part || c.is_wild)
            .find_map(|c| c.search(parts, depth + 1))
    }

    /// Pre-order walk collecting every node that terminates a pattern.
    pub fn travel<'a>(&'a self, list: &mut Vec<&'a Node>) {
        if !self.pattern.is_empty() {
            list.push(self);
        }
        for child in &self.children {
            child.travel(list);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node{{pattern={}, part={}, is_wild={}}}",
            self.pattern, self.part, self.is_wild
        )
    }
}

fn is_wild_segment(part: &str) -> bool {
    part.starts_with(':') || part.starts_with('*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::router::parse_pattern;

    fn insert(root: &mut Node, pattern: &str) -> Result<(), RouteError> {
        let parts: Vec<String> = parse_pattern(pattern).into_iter().map(String::from).collect();
        root.insert(pattern, &parts, 0)
    }

    fn search<'a>(root: &'a Node, path: &str) -> Option<&'a Node> {
        root.search(&parse_pattern(path), 0)
    }

    #[test]
    fn test_intermediate_nodes_have_no_pattern() {
        let mut root = Node::default();
        insert(&mut root, "/p/:lang/doc").unwrap();

        assert!(search(&root, "/p/en").is_none());
        assert_eq!(search(&root, "/p/en/doc").unwrap().pattern(), "/p/:lang/doc");
    }

    #[test]
    fn test_wildcard_terminates_early() {
        let mut root = Node::default();
        insert(&mut root, "/static/*filepath").unwrap();

        let node = search(&root, "/static/css/site/a.css").unwrap();
        assert_eq!(node.pattern(), "/static/*filepath");
        assert!(node.is_wild());
    }

    #[test]
    fn test_first_registered_sibling_wins() {
        let mut root = Node::default();
        insert(&mut root, "/a/:x").unwrap();
        insert(&mut root, "/a/b").unwrap();

        // the wildcard child was inserted first, so it wins for "b" too
        assert_eq!(search(&root, "/a/b").unwrap().pattern(), "/a/:x");

        let mut root = Node::default();
        insert(&mut root, "/a/b").unwrap();
        insert(&mut root, "/a/:x").unwrap();
        assert_eq!(search(&root, "/a/b").unwrap().pattern(), "/a/b");
        assert_eq!(search(&root, "/a/c").unwrap().pattern(), "/a/:x");
    }

    #[test]
    fn test_backtracks_into_later_siblings() {
        let mut root = Node::default();
        insert(&mut root, "/a/b/c").unwrap();
        insert(&mut root, "/a/:x/d").unwrap();

        assert_eq!(search(&root, "/a/b/d").unwrap().pattern(), "/a/:x/d");
    }

    #[test]
    fn test_conflicting_wildcard_rejected() {
        let mut root = Node::default();
        insert(&mut root, "/a/:y").unwrap();

        let err = insert(&mut root, "/a/:x").unwrap_err();
        assert_eq!(
            err,
            RouteError::WildcardConflict {
                pattern: "/a/:x".into(),
                segment: ":x".into(),
                existing: ":y".into(),
            }
        );

        // same variable name is shared, not a conflict
        insert(&mut root, "/a/:y/edit").unwrap();
    }

    #[test]
    fn test_reinsert_is_idempotent() {
        let mut root = Node::default();
        insert(&mut root, "/users/:id").unwrap();
        insert(&mut root, "/users/:id").unwrap();

        let mut list = Vec::new();
        root.travel(&mut list);
        assert_eq!(list.len(), 1);
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_travel_preorder() {
        let mut root = Node::default();
        insert(&mut root, "/").unwrap();
        insert(&mut root, "/hello").unwrap();
        insert(&mut root, "/hello/:name").unwrap();
        insert(&mut root, "/assets/*filepath").unwrap();

        let mut list = Vec::new();
        root.travel(&mut list);
        let patterns: Vec<&str> = list.iter().map(|n| n.pattern()).collect();
        assert_eq!(patterns, vec!["/", "/hello", "/hello/:name", "/assets/*filepath"]);
    }

    #[test]
    fn test_display() {
        let node = Node::child(":lang");
        assert_eq!(node.to_string(), "node{pattern=, part=:lang, is_wild=true}");
    }
}
