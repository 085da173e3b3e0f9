//! Decision tree structures shared by the forest and boosting models
//!
//! Leaves carry a payload vector: a class distribution for classification
//! trees, a single value for regression trees.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0` indexes the encoded input and
/// `left`/`right` point at child nodes. Leaves have `feature_idx == -1` and
/// a `leaf` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Position of this node in `Tree::nodes`
    pub id: i32,

    /// Slot of the `x <= threshold` child; always after this node. -1 on leaves.
    pub left: i32,

    /// Slot of the `x > threshold` child. -1 on leaves.
    pub right: i32,

    /// Column of the encoded input compared at this node; -1 marks a leaf
    pub feature_idx: i32,

    /// Split threshold; `x <= threshold` goes left
    pub threshold: f64,

    /// Class distribution or regression value carried by a leaf
    pub leaf: Option<Vec<f64>>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, payload: Vec<f64>) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(payload),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single decision tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Walk the tree and return the reached leaf payload.
    ///
    /// Returns `None` for a malformed tree or an input shorter than a split
    /// feature index.
    pub fn evaluate(&self, features: &[f64]) -> Option<&[f64]> {
        let mut idx = 0usize;

        // A valid path visits each node at most once
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)?;

            if node.is_leaf() {
                return node.leaf.as_deref();
            }

            let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).ok()?;
        }

        None
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Validate tree structure
    pub fn validate(&self, payload_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left <= i as i32 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }
                if node.right <= i as i32 || node.right as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid right child: {}", i, node.right));
                }
                if !node.threshold.is_finite() {
                    return Err(format!("Node {i} has a non-finite threshold"));
                }
            } else {
                match &node.leaf {
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                    Some(payload) if payload.len() != payload_len => {
                        return Err(format!(
                            "Leaf node {} has {} values, expected {}",
                            i,
                            payload.len(),
                            payload_len
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, vec![100.0]),
            Node::leaf(2, vec![200.0]),
        ])
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 1.5, 1, 2);
        assert_eq!(internal.feature_idx, 3);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, vec![0.25, 0.75]);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0]), Some(&[100.0][..]));
        assert_eq!(tree.evaluate(&[50.0]), Some(&[100.0][..])); // Equal goes left
        assert_eq!(tree.evaluate(&[60.0]), Some(&[200.0][..]));
        assert_eq!(tree.evaluate(&[]), None);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(2).is_err());

        let invalid = Tree::new(vec![
            Node::internal(0, 0, 50.0, 5, 2),
            Node::leaf(1, vec![100.0]),
            Node::leaf(2, vec![200.0]),
        ]);
        assert!(invalid.validate(1).is_err());
    }

    #[test]
    fn cyclic_tree_does_not_loop() {
        let tree = Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 1),
            Node::internal(1, 0, 50.0, 0, 0),
        ]);
        assert_eq!(tree.evaluate(&[1.0]), None);
        assert!(tree.validate(1).is_err());
    }
}
