//! Structural self-check of an index.

use super::page::Node;
use super::tree::Index;
use super::{IndexItem, IndexKey};
use crate::common::{Error, PageRef, Result};

/// What a subtree walk reports back to its parent.
struct Summary {
    depth: usize,
    items: usize,
}

/// Walk state shared by the whole traversal.
struct Walk {
    leaf_depth: Option<usize>,
    leaves: Vec<PageRef>,
}

impl<K: IndexKey, I: IndexItem> Index<K, I> {
    /// Check every structural invariant of the tree.
    ///
    /// This walks the whole index and is meant for tests and diagnostics:
    /// - keys are strictly ascending and inside the range routed to their page,
    /// - no page exceeds `page_size`, no non-root page is below half of it,
    /// - all leaves sit at the same depth,
    /// - every page's accumulators equal the fold of its content,
    /// - the leaf chain visits the leaves in key order and ends at the rightmost one,
    /// - the item count matches `len()`.
    ///
    /// # Errors
    /// `Error::StructuralCorruption` naming the first offending page.
    pub fn verify(&self) -> Result<()> {
        let mut walk = Walk {
            leaf_depth: None,
            leaves: Vec::new(),
        };
        let summary = self.verify_page(self.root, None, None, 1, &mut walk)?;

        if summary.items != self.len {
            return Err(Error::corruption(
                self.root,
                format!("tree holds {} items, index counts {}", summary.items, self.len),
            ));
        }

        let last = walk.leaves.last().copied().unwrap_or(self.root);
        if last != self.rightmost {
            return Err(Error::corruption(
                self.rightmost,
                format!("rightmost leaf is {}", last),
            ));
        }

        let mut next = Some(self.leftmost_leaf()?.read().id());
        for expected in &walk.leaves {
            match next {
                Some(page_ref) if page_ref == *expected => {
                    next = self.provider.resolve(page_ref)?.read().as_leaf()?.right();
                }
                other => {
                    return Err(Error::corruption(
                        *expected,
                        format!("leaf chain reached {:?} instead", other),
                    ));
                }
            }
        }
        if let Some(extra) = next {
            return Err(Error::corruption(extra, "leaf chain continues past the last leaf"));
        }
        Ok(())
    }

    fn verify_page(
        &self,
        page_ref: PageRef,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<Summary> {
        let handle = self.provider.resolve(page_ref)?;
        let page = handle.read();
        if page.id() != page_ref {
            return Err(Error::corruption(page_ref, format!("page reports id {}", page.id())));
        }

        let size = page.current_size();
        if size > self.config.page_size {
            return Err(Error::corruption(page_ref, format!("{} slots overflow the page", size)));
        }
        let is_root = page_ref == self.root;
        if !is_root && size < self.config.min_page_fill() {
            return Err(Error::corruption(page_ref, format!("{} slots underfill the page", size)));
        }

        let in_range = |key: &K| lower.map_or(true, |l| l <= key) && upper.map_or(true, |u| key < u);

        match page.node() {
            Node::Leaf(leaf) => {
                if !leaf.keys().zip(leaf.keys().skip(1)).all(|(a, b)| a < b) {
                    return Err(Error::corruption(page_ref, "leaf keys out of order"));
                }
                if let Some(key) = leaf.keys().find(|&key| !in_range(key)) {
                    return Err(Error::corruption(
                        page_ref,
                        format!("key {:?} outside the routed range", key),
                    ));
                }
                if let Some((key, _)) = leaf.entries().iter().find(|(key, item)| self.key_of(item) != *key) {
                    return Err(Error::corruption(
                        page_ref,
                        format!("item stored under {:?} reports another key", key),
                    ));
                }
                if self.measures.fold_items(leaf.items()) != page.measures() {
                    return Err(Error::corruption(page_ref, "leaf accumulators are stale"));
                }

                match walk.leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(Error::corruption(
                            page_ref,
                            format!("leaf at depth {}, others at {}", depth, expected),
                        ));
                    }
                    _ => walk.leaf_depth = Some(depth),
                }
                walk.leaves.push(page_ref);

                Ok(Summary {
                    depth,
                    items: leaf.len(),
                })
            }
            Node::Inner(inner) => {
                if is_root && inner.is_empty() {
                    return Err(Error::corruption(page_ref, "inner root without separators"));
                }
                if !inner.keys().windows(2).all(|pair| pair[0] < pair[1]) {
                    return Err(Error::corruption(page_ref, "separators out of order"));
                }
                if let Some(key) = inner.keys().iter().find(|&key| !in_range(key)) {
                    return Err(Error::corruption(
                        page_ref,
                        format!("separator {:?} outside the routed range", key),
                    ));
                }
                if self.fold_children(inner)? != page.measures() {
                    return Err(Error::corruption(page_ref, "inner accumulators are stale"));
                }

                let mut items = 0;
                let mut leaf_depth = depth;
                for (slot, child) in inner.children().iter().enumerate() {
                    let child_lower = if slot == 0 { lower } else { Some(inner.key(slot - 1)) };
                    let child_upper = inner.keys().get(slot).or(upper);
                    let summary = self.verify_page(*child, child_lower, child_upper, depth + 1, walk)?;
                    items += summary.items;
                    leaf_depth = summary.depth;
                }
                Ok(Summary {
                    depth: leaf_depth,
                    items,
                })
            }
        }
    }
}
