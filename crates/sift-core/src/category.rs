//! Category-labelled trees
//!
//! A `CategoryTree` pairs a string-only `Tree<()>` with one category mask
//! per slot. Bit `b` of a mask is set when the entry carries
//! `categories[b]`. Masks are stored at the narrowest width that fits the
//! category count; a tree with a single category stores none at all, since
//! every entry implicitly carries it.

use crate::error::Error;
use crate::tree::Tree;

/// Most categories a single tree can carry.
pub const MAX_CATEGORIES: usize = 32;

/// Storage width chosen for the per-slot masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskWidth {
    /// One category; every entry carries it
    Implicit,
    U8,
    U16,
    U32,
}

impl MaskWidth {
    /// Narrowest width for `count` categories.
    pub fn for_count(count: usize) -> Result<Self, Error> {
        match count {
            0 | 1 => Ok(Self::Implicit),
            2..=8 => Ok(Self::U8),
            9..=16 => Ok(Self::U16),
            17..=MAX_CATEGORIES => Ok(Self::U32),
            _ => Err(Error::CategoryOverflow(count)),
        }
    }

    /// Bytes per slot.
    pub fn bytes(&self) -> usize {
        match self {
            Self::Implicit => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MaskStore {
    Implicit,
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl MaskStore {
    fn pack(width: MaskWidth, masks: &[u32]) -> Self {
        // Masks never carry bits above the category count, so the casts are lossless.
        match width {
            MaskWidth::Implicit => Self::Implicit,
            MaskWidth::U8 => Self::U8(masks.iter().map(|&m| m as u8).collect()),
            MaskWidth::U16 => Self::U16(masks.iter().map(|&m| m as u16).collect()),
            MaskWidth::U32 => Self::U32(masks.to_vec()),
        }
    }

    #[inline]
    fn get(&self, slot: usize) -> u32 {
        match self {
            Self::Implicit => 1,
            Self::U8(masks) => masks.get(slot).copied().map_or(0, u32::from),
            Self::U16(masks) => masks.get(slot).copied().map_or(0, u32::from),
            Self::U32(masks) => masks.get(slot).copied().unwrap_or(0),
        }
    }
}

/// Immutable tree whose entries carry one or more categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTree<C> {
    tree: Tree<()>,
    categories: Vec<C>,
    masks: MaskStore,
}

impl<C: Clone + PartialEq> CategoryTree<C> {
    /// Attach masks to a laid-out tree.
    ///
    /// `masks` is parallel to the tree's slots; bit `b` refers to
    /// `categories[b]`.
    pub fn new(tree: Tree<()>, categories: Vec<C>, masks: &[u32]) -> Result<Self, Error> {
        let width = MaskWidth::for_count(categories.len())?;
        if width != MaskWidth::Implicit && masks.len() != tree.capacity() {
            return Err(Error::InvalidLayout(format!(
                "{} masks for {} slots",
                masks.len(),
                tree.capacity()
            )));
        }
        log::debug!(
            "category tree: {} entries, {} categories, {:?} masks",
            tree.len(),
            categories.len(),
            width
        );
        Ok(Self {
            masks: MaskStore::pack(width, masks),
            tree,
            categories,
        })
    }

    /// String-only view, for matchers and whitelists.
    pub fn tree(&self) -> &Tree<()> {
        &self.tree
    }

    /// Categories in bit order.
    pub fn categories(&self) -> &[C] {
        &self.categories
    }

    pub fn mask_width(&self) -> MaskWidth {
        match self.masks {
            MaskStore::Implicit => MaskWidth::Implicit,
            MaskStore::U8(_) => MaskWidth::U8,
            MaskStore::U16(_) => MaskWidth::U16,
            MaskStore::U32(_) => MaskWidth::U32,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Mask stored at a 0-based slot; 0 for vacant slots.
    #[inline]
    pub fn mask_at(&self, slot: usize) -> u32 {
        if self.tree.string_at(slot).is_none() {
            return 0;
        }
        self.masks.get(slot)
    }

    /// Categories carried by the entry at `slot`, in bit order.
    pub fn categories_at(&self, slot: usize) -> Vec<C> {
        let mask = self.mask_at(slot);
        self.categories
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1u32 << *bit) != 0)
            .map(|(_, category)| category.clone())
            .collect()
    }

    /// Every category carried by `text`, or `None` when absent.
    pub fn search(&self, text: &str) -> Option<Vec<C>> {
        let found = self.tree.search(text)?;
        Some(self.categories_at(found.slot))
    }

    /// `category` if `text` is present and carries it.
    pub fn search_category(&self, text: &str, category: &C) -> Option<C> {
        let bit = self.categories.iter().position(|c| c == category)?;
        let found = self.tree.search(text)?;
        (self.mask_at(found.slot) & (1u32 << bit) != 0).then(|| category.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Food {
        Fruit,
        Vegetable,
    }

    fn unit_tree(layout: &[Option<&str>]) -> Tree<()> {
        let strings = layout.iter().map(|s| s.map(str::to_string)).collect();
        Tree::from_slots(strings, Vec::new()).unwrap()
    }

    #[test]
    fn searches_by_category() {
        let tree = unit_tree(&[Some("carrot"), Some("apple"), Some("tomato")]);
        let categories = vec![Food::Fruit, Food::Vegetable];
        let masks = [0b10, 0b01, 0b11];
        let tree = CategoryTree::new(tree, categories, &masks).unwrap();

        assert_eq!(tree.mask_width(), MaskWidth::U8);
        assert_eq!(tree.search("apple"), Some(vec![Food::Fruit]));
        assert_eq!(tree.search_category("apple", &Food::Fruit), Some(Food::Fruit));
        assert_eq!(tree.search_category("apple", &Food::Vegetable), None);
        assert_eq!(tree.search("tomato"), Some(vec![Food::Fruit, Food::Vegetable]));
        assert_eq!(tree.search("pear"), None);
    }

    #[test]
    fn single_category_needs_no_masks() {
        let tree = unit_tree(&[Some("b"), Some("a"), None]);
        let tree = CategoryTree::new(tree, vec!["slur"], &[]).unwrap();
        assert_eq!(tree.mask_width(), MaskWidth::Implicit);
        assert_eq!(tree.search("a"), Some(vec!["slur"]));
        assert_eq!(tree.search_category("b", &"slur"), Some("slur"));
        assert_eq!(tree.mask_at(2), 0);
    }

    #[test]
    fn picks_the_narrowest_width() {
        assert_eq!(MaskWidth::for_count(8), Ok(MaskWidth::U8));
        assert_eq!(MaskWidth::for_count(9), Ok(MaskWidth::U16));
        assert_eq!(MaskWidth::for_count(17), Ok(MaskWidth::U32));
        assert_eq!(MaskWidth::for_count(32).map(|w| w.bytes()), Ok(4));
        assert_eq!(MaskWidth::for_count(33), Err(Error::CategoryOverflow(33)));
    }

    #[test]
    fn keeps_high_bits_in_wide_masks() {
        let tree = unit_tree(&[Some("x")]);
        let categories: Vec<u32> = (0..20).collect();
        let tree = CategoryTree::new(tree, categories, &[1 << 19]).unwrap();
        assert_eq!(tree.mask_width(), MaskWidth::U32);
        assert_eq!(tree.search("x"), Some(vec![19]));
    }
}
