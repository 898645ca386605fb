use std::cell::RefCell;
use std::cmp::{max, Ordering};
use std::fmt;
use std::marker::PhantomData;

use crate::config::{ConfigT, PlainConfig, PlainConfigDebug};
use crate::error::{AvlError, Result};
use crate::iter::{IntoIter, Iter};
use crate::trace::Rebalance;

macro_rules! debug {
    ($writer:expr, $($arg:tt)+) => {
        if Config::DEBUG {
            match &$writer {
                Some(w) => {
                    use std::fmt::Write as _;
                    let _ = writeln!(w.borrow_mut(), $($arg)+);
                }
                None => {
                    log::debug!($($arg)+);
                }
            }
        }
    };
}

pub(crate) type Link<K> = Option<Box<Node<K>>>;

#[derive(Clone, Debug)]
pub(crate) struct Node<K> {
    pub(crate) key: K,
    pub(crate) height: usize,
    pub(crate) left: Link<K>,
    pub(crate) right: Link<K>,
}

impl<K> Node<K> {
    fn leaf(key: K) -> Box<Self> {
        Box::new(Node {
            key,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update_height(&mut self) {
        self.height = 1 + max(height(&self.left), height(&self.right));
    }

    fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }
}

fn height<K>(link: &Link<K>) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn balance_factor<K>(link: &Link<K>) -> isize {
    link.as_ref().map_or(0, |n| n.balance_factor())
}

fn rotate_right<K>(mut y: Box<Node<K>>) -> Box<Node<K>> {
    let mut x = y.left.take().expect("rotate_right on node without left child");
    y.left = x.right.take();
    y.update_height();
    x.right = Some(y);
    x.update_height();
    x
}

fn rotate_left<K>(mut x: Box<Node<K>>) -> Box<Node<K>> {
    let mut y = x.right.take().expect("rotate_left on node without right child");
    x.right = y.left.take();
    x.update_height();
    y.left = Some(x);
    y.update_height();
    y
}

fn min_value_node<K>(node: &Node<K>) -> &Node<K> {
    let mut current = node;
    while let Some(left) = current.left.as_deref() {
        current = left;
    }
    current
}

fn max_value_node<K>(node: &Node<K>) -> &Node<K> {
    let mut current = node;
    while let Some(right) = current.right.as_deref() {
        current = right;
    }
    current
}

/// Height-balanced binary search tree over keys with a total order.
///
/// Duplicate keys are rejected silently: `insert` reports whether the key
/// was new and `delete` whether it was present.
pub struct AvlTree<K, Config: ConfigT = PlainConfig> {
    root: Link<K>,
    len: usize,
    debug_writer: Option<RefCell<Box<dyn fmt::Write>>>,
    _config: PhantomData<Config>,
}

pub type Default<K> = AvlTree<K, PlainConfig>;
pub type DefaultDebug<K> = AvlTree<K, PlainConfigDebug>;

impl<K: Ord> AvlTree<K> {
    pub fn new() -> Self {
        Self::create()
    }
}

impl<K: Ord, Config: ConfigT> AvlTree<K, Config> {
    pub fn create() -> Self {
        AvlTree {
            root: None,
            len: 0,
            debug_writer: None,
            _config: PhantomData,
        }
    }

    /// Rebalance events are written to `writer`, one per line, when
    /// `Config::DEBUG` is set.
    pub fn create_with_debug_writer(writer: impl fmt::Write + 'static) -> Self {
        AvlTree {
            debug_writer: Some(RefCell::new(Box::new(writer))),
            ..Self::create()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn height(&self) -> usize {
        height(&self.root)
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Returns `false` and leaves the tree untouched if `key` is already present.
    pub fn insert(&mut self, key: K) -> bool {
        let mut inserted = false;
        let root = self.root.take();
        let (root, _) = self.insert_into(root, key, 0, &mut inserted);
        self.root = Some(root);
        if inserted {
            self.len += 1;
        }
        self.check_invariants();
        inserted
    }

    /// Returns `false` if `key` was not present.
    pub fn delete(&mut self, key: &K) -> bool {
        let mut deleted = false;
        let root = self.root.take();
        self.root = self.delete_from(root, key, 0, &mut deleted);
        if deleted {
            self.len -= 1;
        }
        self.check_invariants();
        deleted
    }

    pub fn find(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// The stored key equal to `key`.
    pub fn get(&self, key: &K) -> Option<&K> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.key),
            }
        }
        None
    }

    pub fn find_min(&self) -> Result<&K> {
        self.root
            .as_deref()
            .map(|n| &min_value_node(n).key)
            .ok_or(AvlError::EmptyTree)
    }

    pub fn find_max(&self) -> Result<&K> {
        self.root
            .as_deref()
            .map(|n| &max_value_node(n).key)
            .ok_or(AvlError::EmptyTree)
    }

    /// Snapshot of all keys in ascending order.
    pub fn in_order(&self) -> Vec<&K> {
        fn traverse<'a, K>(link: &'a Link<K>, out: &mut Vec<&'a K>) {
            if let Some(n) = link {
                traverse(&n.left, out);
                out.push(&n.key);
                traverse(&n.right, out);
            }
        }
        let mut keys = Vec::with_capacity(self.len);
        traverse(&self.root, &mut keys);
        keys
    }

    pub fn in_order_traversal(&self) -> Vec<&K> {
        self.in_order()
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter::new(&self.root, self.len)
    }

    /// Checks ordering, balance, stored heights and `len` over the whole tree.
    pub fn validate(&self) -> Result<()> {
        let (_, counted) = Self::validate_node(&self.root, None, None)?;
        if counted != self.len {
            return Err(AvlError::LenMismatch {
                counted,
                recorded: self.len,
            });
        }
        Ok(())
    }

    fn validate_node(
        link: &Link<K>,
        lower: Option<&K>,
        upper: Option<&K>,
    ) -> Result<(usize, usize)> {
        let Some(node) = link else {
            return Ok((0, 0));
        };
        if lower.is_some_and(|l| l >= &node.key) || upper.is_some_and(|u| u <= &node.key) {
            return Err(AvlError::Unordered);
        }
        let (lh, lc) = Self::validate_node(&node.left, lower, Some(&node.key))?;
        let (rh, rc) = Self::validate_node(&node.right, Some(&node.key), upper)?;
        let computed = 1 + max(lh, rh);
        if node.height != computed {
            return Err(AvlError::HeightMismatch {
                stored: node.height,
                computed,
            });
        }
        let balance = lh as isize - rh as isize;
        if balance.abs() > 1 {
            return Err(AvlError::Unbalanced { balance });
        }
        Ok((computed, lc + rc + 1))
    }

    fn check_invariants(&self) {
        if Config::CHECK_INVARIANTS {
            if let Err(err) = self.validate() {
                panic!("avl invariant violated: {err}");
            }
        }
    }

    /// Returns the rebuilt subtree and how `key` compared against its root
    /// before any rotation at this level.
    fn insert_into(
        &self,
        link: Link<K>,
        key: K,
        depth: usize,
        inserted: &mut bool,
    ) -> (Box<Node<K>>, Ordering) {
        let Some(mut node) = link else {
            *inserted = true;
            return (Node::leaf(key), Ordering::Equal);
        };

        let ord = key.cmp(&node.key);
        // How `key` compared one level down. Equal to comparing it against
        // the child's current key whenever this level ends up unbalanced.
        let below = match ord {
            Ordering::Less => {
                let (left, below) = self.insert_into(node.left.take(), key, depth + 1, inserted);
                node.left = Some(left);
                below
            }
            Ordering::Greater => {
                let (right, below) = self.insert_into(node.right.take(), key, depth + 1, inserted);
                node.right = Some(right);
                below
            }
            Ordering::Equal => return (node, ord),
        };

        node.update_height();
        let balance = node.balance_factor();

        let node = if balance > 1 && below == Ordering::Less {
            self.rotate(node, Rebalance::LeftLeft, "insert", depth)
        } else if balance < -1 && below == Ordering::Greater {
            self.rotate(node, Rebalance::RightRight, "insert", depth)
        } else if balance > 1 && below == Ordering::Greater {
            self.rotate(node, Rebalance::LeftRight, "insert", depth)
        } else if balance < -1 && below == Ordering::Less {
            self.rotate(node, Rebalance::RightLeft, "insert", depth)
        } else {
            node
        };
        (node, ord)
    }

    fn delete_from(&self, link: Link<K>, key: &K, depth: usize, deleted: &mut bool) -> Link<K> {
        let mut node = link?;
        match key.cmp(&node.key) {
            Ordering::Less => node.left = self.delete_from(node.left.take(), key, depth + 1, deleted),
            Ordering::Greater => {
                node.right = self.delete_from(node.right.take(), key, depth + 1, deleted)
            }
            Ordering::Equal => {
                *deleted = true;
                match (node.left.take(), node.right.take()) {
                    (None, None) => return None,
                    (Some(child), None) | (None, Some(child)) => return Some(child),
                    (Some(left), Some(right)) => {
                        debug!(
                            self.debug_writer,
                            "delete: successor replaces key at depth {depth}"
                        );
                        let (right, successor) = self.remove_min(right, depth + 1);
                        node.key = successor;
                        node.left = Some(left);
                        node.right = right;
                    }
                }
            }
        }
        Some(self.rebalance_after_delete(node, depth))
    }

    /// Unlinks the leftmost node of `node`'s subtree, returning the
    /// rebalanced remainder and the removed key.
    fn remove_min(&self, mut node: Box<Node<K>>, depth: usize) -> (Link<K>, K) {
        match node.left.take() {
            None => {
                let Node { key, right, .. } = *node;
                (right, key)
            }
            Some(left) => {
                let (left, min) = self.remove_min(left, depth + 1);
                node.left = left;
                (Some(self.rebalance_after_delete(node, depth)), min)
            }
        }
    }

    fn rebalance_after_delete(&self, mut node: Box<Node<K>>, depth: usize) -> Box<Node<K>> {
        node.update_height();
        let balance = node.balance_factor();

        if balance > 1 {
            if balance_factor(&node.left) >= 0 {
                self.rotate(node, Rebalance::LeftLeft, "delete", depth)
            } else {
                self.rotate(node, Rebalance::LeftRight, "delete", depth)
            }
        } else if balance < -1 {
            if balance_factor(&node.right) <= 0 {
                self.rotate(node, Rebalance::RightRight, "delete", depth)
            } else {
                self.rotate(node, Rebalance::RightLeft, "delete", depth)
            }
        } else {
            node
        }
    }

    fn rotate(
        &self,
        mut node: Box<Node<K>>,
        case: Rebalance,
        op: &str,
        depth: usize,
    ) -> Box<Node<K>> {
        debug!(self.debug_writer, "{op}: {case} rotation at depth {depth}");
        match case {
            Rebalance::LeftLeft => rotate_right(node),
            Rebalance::RightRight => rotate_left(node),
            Rebalance::LeftRight => {
                node.left = node.left.take().map(rotate_left);
                rotate_right(node)
            }
            Rebalance::RightLeft => {
                node.right = node.right.take().map(rotate_right);
                rotate_left(node)
            }
        }
    }
}

impl<K: Ord, Config: ConfigT> std::default::Default for AvlTree<K, Config> {
    fn default() -> Self {
        Self::create()
    }
}

impl<K: Clone, Config: ConfigT> Clone for AvlTree<K, Config> {
    /// The copy keeps the shape of the original but no debug writer.
    fn clone(&self) -> Self {
        AvlTree {
            root: self.root.clone(),
            len: self.len,
            debug_writer: None,
            _config: PhantomData,
        }
    }
}

impl<K: Ord + fmt::Debug, Config: ConfigT> fmt::Debug for AvlTree<K, Config> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord, Config: ConfigT> FromIterator<K> for AvlTree<K, Config> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut tree = Self::create();
        tree.extend(iter);
        tree
    }
}

impl<K: Ord, Config: ConfigT> Extend<K> for AvlTree<K, Config> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K, Config: ConfigT> IntoIterator for AvlTree<K, Config> {
    type Item = K;
    type IntoIter = IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.root, self.len)
    }
}

impl<'a, K: Ord, Config: ConfigT> IntoIterator for &'a AvlTree<K, Config> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    use expect_test::expect;

    use crate::config::CheckedConfig;

    /// Sideways view: in-order, indented by depth, with stored heights.
    fn pretty_print_to_string<K: fmt::Display>(link: &Link<K>) -> String {
        fn traverse<K: fmt::Display>(link: &Link<K>, level: usize, out: &mut String) {
            if let Some(n) = link {
                traverse(&n.left, level + 1, out);
                writeln!(out, "{}{} [{}]", "  ".repeat(level), n.key, n.height)
                    .expect("writing to String cannot fail");
                traverse(&n.right, level + 1, out);
            }
        }
        let mut out = String::new();
        traverse(link, 0, &mut out);
        out
    }

    fn tree_of(keys: &[i32]) -> AvlTree<i32, CheckedConfig> {
        keys.iter().copied().collect()
    }

    fn chain_left(keys: &[i32]) -> Box<Node<i32>> {
        // keys[0] at the top, each next key as the left child of the previous
        let mut link: Link<i32> = None;
        for &k in keys.iter().rev() {
            let mut node = Node::leaf(k);
            node.left = link;
            node.update_height();
            link = Some(node);
        }
        link.unwrap()
    }

    #[test]
    fn test_height_of_absent_is_zero() {
        let link: Link<i32> = None;
        assert_eq!(height(&link), 0);
        assert_eq!(balance_factor(&link), 0);
        let leaf = Some(Node::leaf(1));
        assert_eq!(height(&leaf), 1);
        assert_eq!(balance_factor(&leaf), 0);
    }

    #[test]
    fn test_rotate_right_promotes_left_child() {
        let root = rotate_right(chain_left(&[3, 2, 1]));
        let s = pretty_print_to_string(&Some(root));
        let expect = expect![[r#"
              1 [1]
            2 [2]
              3 [1]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_rotate_right_moves_inner_grandchild() {
        // 4 with left 2 (1, 3): 3 must end up as 4's left child
        let mut two = Node::leaf(2);
        two.left = Some(Node::leaf(1));
        two.right = Some(Node::leaf(3));
        two.update_height();
        let mut four = Node::leaf(4);
        four.left = Some(two);
        four.update_height();

        let root = rotate_right(four);
        let s = pretty_print_to_string(&Some(root));
        let expect = expect![[r#"
              1 [1]
            2 [3]
                3 [1]
              4 [2]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_rotate_left_promotes_right_child() {
        let mut one = Node::leaf(1);
        let mut two = Node::leaf(2);
        two.right = Some(Node::leaf(3));
        two.update_height();
        one.right = Some(two);
        one.update_height();

        let root = rotate_left(one);
        assert_eq!(root.key, 2);
        assert_eq!(root.height, 2);
        assert_eq!(root.left.as_ref().map(|n| n.key), Some(1));
        assert_eq!(root.right.as_ref().map(|n| n.key), Some(3));
    }

    #[test]
    #[should_panic(expected = "rotate_left on node without right child")]
    fn test_rotate_left_without_right_child_panics() {
        rotate_left(Node::leaf(1));
    }

    #[test]
    fn test_min_value_node_descends_left() {
        let root = chain_left(&[30, 20, 10]);
        assert_eq!(min_value_node(&root).key, 10);
        assert_eq!(max_value_node(&root).key, 30);
    }

    #[test]
    fn test_right_right_shape() {
        let tree = tree_of(&[10, 20, 30]);
        let s = pretty_print_to_string(&tree.root);
        let expect = expect![[r#"
              10 [1]
            20 [2]
              30 [1]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_left_right_shape() {
        let tree = tree_of(&[30, 10, 20]);
        let s = pretty_print_to_string(&tree.root);
        let expect = expect![[r#"
              10 [1]
            20 [2]
              30 [1]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_sequential_inserts_build_perfect_tree() {
        let tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);
        let s = pretty_print_to_string(&tree.root);
        let expect = expect![[r#"
                1 [1]
              2 [2]
                3 [1]
            4 [3]
                5 [1]
              6 [2]
                7 [1]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_delete_two_children_takes_successor() {
        let mut tree = tree_of(&[20, 10, 30, 5, 15]);
        assert!(tree.delete(&20));
        let s = pretty_print_to_string(&tree.root);
        let expect = expect![[r#"
              5 [1]
            10 [3]
                15 [1]
              30 [2]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_remove_min_rebalances_on_the_way_up() {
        let tree = tree_of(&[2, 1, 3, 4]);
        let root = tree.root.clone().unwrap();
        let (rest, min) = tree.remove_min(root, 0);
        assert_eq!(min, 1);
        let s = pretty_print_to_string(&rest);
        let expect = expect![[r#"
              2 [1]
            3 [2]
              4 [1]
        "#]];
        expect.assert_eq(&s);
    }

    #[test]
    fn test_validate_reports_stale_height() {
        let mut tree = tree_of(&[2, 1, 3]);
        tree.root.as_mut().unwrap().height = 5;
        assert_eq!(
            tree.validate(),
            Err(AvlError::HeightMismatch {
                stored: 5,
                computed: 2
            })
        );
    }

    #[test]
    fn test_validate_reports_unbalanced_chain() {
        let tree: AvlTree<i32> = AvlTree {
            root: Some(chain_left(&[3, 2, 1])),
            len: 3,
            debug_writer: None,
            _config: PhantomData,
        };
        assert_eq!(tree.validate(), Err(AvlError::Unbalanced { balance: 2 }));
    }

    #[test]
    fn test_validate_reports_misordered_keys() {
        let mut tree = tree_of(&[2, 1, 3]);
        tree.root.as_mut().unwrap().left.as_mut().unwrap().key = 9;
        assert_eq!(tree.validate(), Err(AvlError::Unordered));
    }

    #[test]
    fn test_validate_reports_len_mismatch() {
        let mut tree = tree_of(&[2, 1, 3]);
        tree.len = 7;
        assert_eq!(
            tree.validate(),
            Err(AvlError::LenMismatch {
                counted: 3,
                recorded: 7
            })
        );
    }

    #[test]
    fn test_clone_keeps_shape() {
        let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9, 2]);
        let copy = tree.clone();
        assert_eq!(
            pretty_print_to_string(&tree.root),
            pretty_print_to_string(&copy.root)
        );
    }
}
