//! Data models for catalog items, recipes and demand trees

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Item rarity as reported by the game data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rarity {
    #[default]
    Default,
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 7] = [
        Rarity::Default,
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rarity::Default => "Default",
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rarity::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rarity '{}'", s))
    }
}

/// One ingredient of a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedItem {
    pub item_id: u64,
    pub quantity: u32,
}

/// One row of a recipe's yield table: `count` units produced with relative `weight`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldEntry {
    pub count: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRequirement {
    pub skill: String,
    pub level: u32,
}

/// One way of crafting an item
///
/// The yield table keeps the order of the source data; the output range
/// inference walks it front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub consumed_items: Vec<ConsumedItem>,
    pub output_multiplier: u32,
    pub yield_distribution: Vec<YieldEntry>,
    pub level_requirement: Option<SkillRequirement>,
}

/// A catalog entry. An empty `recipes` list marks a raw resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    pub id: u64,
    pub name: String,
    pub generic_name: String,
    pub tier: i32, // -1 = tierless
    pub rarity: Rarity,
    pub recipes: Vec<Recipe>,
}

impl ItemDefinition {
    pub fn is_raw(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// A node of a computed demand tree
///
/// `max_quantity == 0` means no upper bound is known. `ancestor_path`
/// holds every item id from the root down to and including this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandNode {
    pub(crate) item_id: u64,
    pub(crate) selected_recipe_index: u32,
    pub(crate) min_quantity: u32,
    pub(crate) max_quantity: u32,
    pub(crate) ancestor_path: BTreeSet<u64>,
    pub(crate) loop_detected: bool,
    pub(crate) children: Vec<DemandNode>,
}

impl DemandNode {
    pub fn item_id(&self) -> u64 {
        self.item_id
    }

    pub fn selected_recipe_index(&self) -> u32 {
        self.selected_recipe_index
    }

    pub fn min_quantity(&self) -> u32 {
        self.min_quantity
    }

    pub fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    /// `(min, max)` pair, with `max == 0` meaning unbounded
    pub fn quantity_range(&self) -> (u32, u32) {
        (self.min_quantity, self.max_quantity)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_quantity == 0
    }

    pub fn ancestor_path(&self) -> &BTreeSet<u64> {
        &self.ancestor_path
    }

    pub fn loop_detected(&self) -> bool {
        self.loop_detected
    }

    pub fn children(&self) -> &[DemandNode] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Follow child indices from this node. An empty path returns `self`.
    pub fn node_at(&self, path: &[usize]) -> Option<&DemandNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DemandNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Visit every node pre-order together with its depth (root = 0)
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a DemandNode, usize),
    {
        self.walk_from(0, visit);
    }

    fn walk_from<'a, F>(&'a self, depth: usize, visit: &mut F)
    where
        F: FnMut(&'a DemandNode, usize),
    {
        visit(self, depth);
        for child in &self.children {
            child.walk_from(depth + 1, visit);
        }
    }

    /// Total number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| count += 1);
        count
    }
}
