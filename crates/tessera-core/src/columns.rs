//! Column layout changes on blocks.
//!
//! A block either holds columns or holds content directly. Changing the
//! column count rebuilds the block's child list in one step:
//!
//! - more columns: empty columns are appended
//! - fewer columns: children of the dropped trailing columns move, in order,
//!   to the end of the last remaining column
//! - zero columns: the remaining children are unwrapped into the block
//! - content to columns: existing content goes into the first column
//!
//! Widths are rewritten evenly on every change.

use crate::error::TreeError;
use crate::node::{Node, NodeId, NodeKind, StyleProperty, validate_subtree};
use crate::notify::TreeChange;
use crate::tree::ContentTree;

pub const MAX_COLUMNS: usize = 12;

/// Even CSS width for one of `count` columns, e.g. `"33.3333%"`.
pub fn column_width(count: usize) -> String {
    let width = 100.0 / count.max(1) as f64;
    if width.fract() == 0.0 {
        format!("{}%", width as u64)
    } else {
        let text = format!("{width:.4}");
        format!("{}%", text.trim_end_matches('0'))
    }
}

/// Number of columns a block currently has (0 for a content block).
pub fn column_count(tree: &ContentTree, block: NodeId) -> Option<usize> {
    let node = tree.get(block)?;
    Some(
        node.children
            .iter()
            .filter(|c| c.kind == NodeKind::Column)
            .count(),
    )
}

/// Set the number of columns in `block`. Nothing changes on error.
pub fn set_column_count(
    tree: &mut ContentTree,
    block: NodeId,
    count: usize,
) -> Result<(), TreeError> {
    let node = tree.get(block).ok_or(TreeError::StaleReference(block))?;
    if node.kind != NodeKind::Block {
        return Err(TreeError::InvalidContainment {
            child: NodeKind::Column,
            parent: node.kind,
        });
    }
    let count = if count > MAX_COLUMNS {
        tracing::warn!(count, max = MAX_COLUMNS, "column count clamped");
        MAX_COLUMNS
    } else {
        count
    };

    let current = node.children.clone();
    let mut children = if node.has_columns() {
        resize_columns(current, count)?
    } else if count == 0 {
        return Ok(());
    } else {
        let mut first = Node::new(NodeKind::Column);
        first.children = current;
        let mut columns = vec![first];
        columns.resize_with(count, || Node::new(NodeKind::Column));
        columns
    };

    if count > 0 {
        let width = column_width(count);
        for column in &mut children {
            column.styles.set(StyleProperty::Width, width.as_str());
        }
    }

    let mut candidate = node.clone();
    candidate.children = children.clone();
    validate_subtree(&candidate)?;

    if tree.get(block).is_some_and(|n| n.children == children) {
        return Ok(());
    }
    tree.replace_children(block, children)?;
    tracing::debug!(%block, count, "column count changed");
    tree.emit(TreeChange::ColumnsChanged { block, count });
    Ok(())
}

fn resize_columns(mut columns: Vec<Node>, count: usize) -> Result<Vec<Node>, TreeError> {
    if count == 0 {
        let merged: Vec<Node> = columns.into_iter().flat_map(|c| c.children).collect();
        if let Some(nested) = merged.iter().find(|n| n.kind != NodeKind::Snippet) {
            return Err(TreeError::InvalidContainment {
                child: nested.kind,
                parent: NodeKind::Block,
            });
        }
        return Ok(merged);
    }

    if count < columns.len() {
        let removed = columns.split_off(count);
        if let Some(last) = columns.last_mut() {
            for column in removed {
                last.children.extend(column.children);
            }
        }
    } else {
        columns.resize_with(count, || Node::new(NodeKind::Column));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::node::{SnippetContent, SnippetKind};

    fn text(markup: &str) -> Node {
        Node::snippet(SnippetContent::new(SnippetKind::Text, markup))
    }

    fn markups(node: &Node) -> Vec<String> {
        node.children
            .iter()
            .filter_map(|c| c.content.as_snippet().map(|s| s.markup.clone()))
            .collect()
    }

    fn block_with_columns(per_column: &[&[&str]]) -> (ContentTree, NodeId) {
        let mut tree = ContentTree::new();
        let mut block = Node::new(NodeKind::Block);
        for markup in per_column {
            let mut column = Node::new(NodeKind::Column);
            for m in *markup {
                column = column.with_child(text(m));
            }
            block = block.with_child(column);
        }
        let root = tree.root_id();
        let id = tree.insert(block, root, 0).unwrap();
        (tree, id)
    }

    #[test]
    fn test_widths() {
        assert_eq!(column_width(1), "100%");
        assert_eq!(column_width(2), "50%");
        assert_eq!(column_width(3), "33.3333%");
        assert_eq!(column_width(8), "12.5%");
    }

    #[test]
    fn test_increase_appends_empty_columns() {
        let (mut tree, block) = block_with_columns(&[&["a"]]);
        set_column_count(&mut tree, block, 3).unwrap();
        let node = tree.get(block).unwrap();
        assert_eq!(node.children.len(), 3);
        assert_eq!(markups(&node.children[0]), vec!["a"]);
        assert!(node.children[2].children.is_empty());
        assert!(!node.children[2].id.is_pending());
        assert_eq!(
            node.children[1].styles.get(StyleProperty::Width),
            Some("33.3333%")
        );
    }

    #[test]
    fn test_decrease_merges_into_last_column() {
        let (mut tree, block) = block_with_columns(&[&["a"], &["b"], &["c", "d"]]);
        set_column_count(&mut tree, block, 1).unwrap();
        let node = tree.get(block).unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(markups(&node.children[0]), vec!["a", "b", "c", "d"]);
        assert_eq!(node.children[0].styles.get(StyleProperty::Width), Some("100%"));
    }

    #[test]
    fn test_zero_unwraps_columns() {
        let (mut tree, block) = block_with_columns(&[&["a"], &["b"]]);
        set_column_count(&mut tree, block, 0).unwrap();
        let node = tree.get(block).unwrap();
        assert!(!node.has_columns());
        assert_eq!(markups(node), vec!["a", "b"]);
    }

    #[test]
    fn test_unwrap_with_nested_block_fails_atomically() {
        let (mut tree, block) = block_with_columns(&[&["a"]]);
        let column = tree.get(block).unwrap().children[0].id;
        tree.insert(Node::new(NodeKind::Block), column, 1).unwrap();
        let before = tree.serialize().unwrap();

        let err = set_column_count(&mut tree, block, 0).unwrap_err();
        assert!(matches!(err, TreeError::InvalidContainment { .. }));
        assert_eq!(tree.serialize().unwrap(), before);
    }

    #[test]
    fn test_content_block_wraps_into_first_column() {
        let mut tree = ContentTree::new();
        let root = tree.root_id();
        let block = tree
            .insert(
                Node::new(NodeKind::Block).with_child(text("x")).with_child(text("y")),
                root,
                0,
            )
            .unwrap();
        let ids_before: Vec<NodeId> =
            tree.get(block).unwrap().children.iter().map(|c| c.id).collect();

        set_column_count(&mut tree, block, 2).unwrap();
        let node = tree.get(block).unwrap();
        assert_eq!(column_count(&tree, block), Some(2));
        let first = &node.children[0];
        let ids_after: Vec<NodeId> = first.children.iter().map(|c| c.id).collect();
        assert_eq!(ids_before, ids_after);
    }

    #[test]
    fn test_emits_once_and_skips_noop() {
        let (mut tree, block) = block_with_columns(&[&["a"], &["b"]]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.on_structural_change(move |c| sink.borrow_mut().push(c.clone()));

        set_column_count(&mut tree, block, 3).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![TreeChange::ColumnsChanged { block, count: 3 }]
        );

        // same count with widths already even
        set_column_count(&mut tree, block, 3).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_rejects_non_block() {
        let mut tree = ContentTree::new();
        let root = tree.root_id();
        assert!(set_column_count(&mut tree, root, 2).is_err());
        assert!(matches!(
            set_column_count(&mut tree, NodeId(404), 2),
            Err(TreeError::StaleReference(_))
        ));
    }
}
