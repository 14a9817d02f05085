//! Writing an index to a page stream.

use std::collections::HashMap;

use super::page::{InnerPage, Node};
use super::tree::Index;
use super::{IndexItem, IndexKey};
use crate::common::{Error, PageRef, Result};
use crate::storage::page::{encode_node, DescriptorPage, StoredPage};
use crate::storage::{BloomFilter, Codec, PageAllocator};

impl<K: IndexKey + Codec, I: IndexItem + Codec> Index<K, I> {
    /// Write the whole index through `allocator` and commit its descriptor.
    ///
    /// Leaves are written first, in key order, each followed by the offset
    /// of the next one; inner pages follow bottom-up so every child offset
    /// is known when its parent is encoded. With `use_bloom_filter` set, a
    /// filter over all keys is written after the descriptor.
    ///
    /// Returns the committed descriptor.
    pub fn serialize(&self, allocator: &mut impl PageAllocator) -> Result<DescriptorPage> {
        let mut offsets: HashMap<PageRef, PageRef> = HashMap::new();
        let mut bloom = self
            .config
            .use_bloom_filter
            .then(|| BloomFilter::with_rate(self.len, self.config.bloom_false_positive_rate));

        // Encode the leaf chain up front: each link needs the next leaf's offset
        let mut leaves: Vec<(PageRef, StoredPage)> = Vec::new();
        let mut next = Some(self.leftmost_leaf()?.read().id());
        while let Some(page_ref) = next {
            let handle = self.provider.resolve(page_ref)?;
            let page = handle.read();
            let leaf = page.as_leaf()?;
            if let Some(bloom) = bloom.as_mut() {
                leaf.keys().for_each(|key| bloom.insert(key));
            }
            leaves.push((page_ref, encode_node(page.node(), page.measures())));
            next = leaf.right();
        }

        let mut position = allocator.position();
        let mut predicted = Vec::with_capacity(leaves.len());
        for (_, stored) in &leaves {
            predicted.push(PageRef::new(position));
            position += stored.stored_len();
        }

        for (i, (page_ref, mut stored)) in leaves.into_iter().enumerate() {
            stored.right = predicted.get(i + 1).copied();
            let offset = allocator.assign_offset(&stored)?;
            if offset != predicted[i] {
                return Err(Error::corruption(
                    page_ref,
                    format!("allocator placed leaf at {} instead of {}", offset, predicted[i]),
                ));
            }
            offsets.insert(page_ref, offset);
        }

        let root = self.write_subtree(self.root, allocator, &offsets)?;
        let rightmost = *offsets
            .get(&self.rightmost)
            .ok_or_else(|| Error::corruption(self.rightmost, "rightmost page is not in the leaf chain"))?;

        let descriptor = DescriptorPage {
            page_size: self.config.page_size as u32,
            use_bloom_filter: bloom.is_some(),
            root,
            rightmost,
            item_count: self.len as u64,
            measure_count: self.measures.len() as u16,
        };
        allocator.commit(&descriptor, bloom.as_ref())?;
        Ok(descriptor)
    }

    /// Write the inner pages of a subtree in post-order, returning its offset.
    fn write_subtree(
        &self,
        page_ref: PageRef,
        allocator: &mut impl PageAllocator,
        leaf_offsets: &HashMap<PageRef, PageRef>,
    ) -> Result<PageRef> {
        let handle = self.provider.resolve(page_ref)?;
        let (keys, children, measures) = {
            let page = handle.read();
            match page.node() {
                Node::Leaf(_) => {
                    return leaf_offsets
                        .get(&page_ref)
                        .copied()
                        .ok_or_else(|| Error::corruption(page_ref, "leaf is not in the leaf chain"));
                }
                Node::Inner(inner) => (
                    inner.keys().to_vec(),
                    inner.children().to_vec(),
                    page.measures().to_vec(),
                ),
            }
        };

        let mut offsets = Vec::with_capacity(children.len());
        for child in children {
            offsets.push(self.write_subtree(child, allocator, leaf_offsets)?);
        }

        let node: Node<K, I> = Node::Inner(InnerPage::from_parts(keys, offsets));
        allocator.assign_offset(&encode_node(&node, &measures))
    }
}
