//! Demand propagation through recipe trees
//!
//! Builds a tree of everything needed to craft a target item, carrying a
//! min/max quantity range on every node. Crafting yields are probabilistic,
//! so each recipe is first reduced to a guaranteed output range per craft
//! and the ingredient demand is derived from that range.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, trace};

use crate::catalog::Catalog;
use crate::error::PlanError;
use crate::export::quantity_string;
use crate::models::{DemandNode, ItemDefinition, Recipe};

/// Units produced by a single craft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRange {
    pub min: u32,
    pub max: u32,
}

/// Infer the guaranteed output range of one craft from the recipe's yield table
///
/// The weight thresholds come from observed game data: a weight of 8.0 or
/// more reads as "at least one, sometimes up to `count`", weights of 2.0 or
/// more (or below 1.0) read as "possibly none, up to `count`". Entries are
/// applied in table order.
pub fn yield_range(recipe: &Recipe) -> OutputRange {
    let mut min_base: Option<u32> = None;
    let mut max_base = 1u32;
    let mut weight_sum = 0.0;

    for entry in &recipe.yield_distribution {
        weight_sum += entry.weight;
        if entry.weight >= 8.0 {
            min_base = Some(1);
            max_base = entry.count;
        } else if entry.weight >= 2.0 || entry.weight < 1.0 {
            min_base = Some(0);
            max_base = entry.count;
        }

        min_base = Some(min_base.map_or(entry.count, |min| min.min(entry.count)));
        max_base = max_base.max(entry.count);
    }

    let min_base = match min_base {
        None => 1,
        Some(0) if weight_sum >= 1.0 => recipe
            .yield_distribution
            .iter()
            .map(|entry| entry.count)
            .min()
            .unwrap_or(0),
        Some(min) => min,
    };

    let range = OutputRange {
        min: min_base.saturating_mul(recipe.output_multiplier),
        max: max_base.saturating_mul(recipe.output_multiplier),
    };
    trace!(
        "yield table {:?} x{} -> {}..{}",
        recipe.yield_distribution, recipe.output_multiplier, range.min, range.max
    );
    range
}

/// Demand range for one ingredient, given the parent's range and the
/// recipe's per-craft output
///
/// A recipe that may yield nothing gives the ingredient no upper bound.
pub fn ingredient_demand(
    min_quantity: u32,
    max_quantity: u32,
    output: OutputRange,
    quantity_per_craft: u32,
) -> (u32, u32) {
    let min = min_quantity
        .div_ceil(output.max.max(1))
        .saturating_mul(quantity_per_craft);
    let max = if output.min > 0 {
        max_quantity
            .div_ceil(output.min)
            .saturating_mul(quantity_per_craft)
    } else {
        0
    };
    (min, max)
}

/// Builds and rebuilds demand trees over a borrowed catalog
pub struct Planner<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: Catalog + ?Sized> Planner<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a C {
        self.catalog
    }

    /// Plan `quantity` units of `root_id` using its default recipe
    pub fn expand_root(&self, root_id: u64, quantity: u32) -> Result<DemandNode, PlanError> {
        self.expand(root_id, 0, BTreeSet::from([root_id]), quantity, quantity)
    }

    /// Build the subtree for `item_id`
    ///
    /// `ancestor_path` must already contain `item_id`. A `recipe_index`
    /// past the item's recipe list produces a leaf.
    pub fn expand(
        &self,
        item_id: u64,
        recipe_index: u32,
        ancestor_path: BTreeSet<u64>,
        min_quantity: u32,
        max_quantity: u32,
    ) -> Result<DemandNode, PlanError> {
        let item = self
            .catalog
            .lookup(item_id)
            .ok_or(PlanError::UnknownItem(item_id))?;
        Ok(self.build(item, recipe_index, ancestor_path, min_quantity, max_quantity))
    }

    /// Rebuild `node` with a new recipe or quantity range, keeping its place
    /// in the tree
    pub fn reexpand(
        &self,
        node: &DemandNode,
        recipe_index: u32,
        min_quantity: u32,
        max_quantity: u32,
    ) -> Result<DemandNode, PlanError> {
        self.expand(
            node.item_id,
            recipe_index,
            node.ancestor_path.clone(),
            min_quantity,
            max_quantity,
        )
    }

    /// Replace the subtree at `path` (child indices from `root`) in place
    ///
    /// Nodes outside the subtree are left untouched, so their paths stay valid.
    pub fn reexpand_at(
        &self,
        root: &mut DemandNode,
        path: &[usize],
        recipe_index: u32,
        min_quantity: u32,
        max_quantity: u32,
    ) -> Result<(), PlanError> {
        let target = root
            .node_at_mut(path)
            .ok_or_else(|| PlanError::NoSuchNode(path.to_vec()))?;
        *target = self.reexpand(target, recipe_index, min_quantity, max_quantity)?;
        Ok(())
    }

    /// Switch the recipe of the node at `path`, keeping its quantity range.
    /// Returns `false` when that recipe was already selected.
    pub fn change_recipe_at(
        &self,
        root: &mut DemandNode,
        path: &[usize],
        recipe_index: u32,
    ) -> Result<bool, PlanError> {
        let node = root
            .node_at(path)
            .ok_or_else(|| PlanError::NoSuchNode(path.to_vec()))?;
        if node.selected_recipe_index == recipe_index {
            return Ok(false);
        }
        let (min, max) = node.quantity_range();
        self.reexpand_at(root, path, recipe_index, min, max)?;
        Ok(true)
    }

    /// Request an exact `quantity` at `path`, keeping its recipe.
    /// Returns `false` when the node already asks for exactly that amount.
    pub fn change_quantity_at(
        &self,
        root: &mut DemandNode,
        path: &[usize],
        quantity: u32,
    ) -> Result<bool, PlanError> {
        let node = root
            .node_at(path)
            .ok_or_else(|| PlanError::NoSuchNode(path.to_vec()))?;
        if node.quantity_range() == (quantity, quantity) {
            return Ok(false);
        }
        let recipe_index = node.selected_recipe_index;
        self.reexpand_at(root, path, recipe_index, quantity, quantity)?;
        Ok(true)
    }

    fn build(
        &self,
        item: &ItemDefinition,
        recipe_index: u32,
        ancestor_path: BTreeSet<u64>,
        min_quantity: u32,
        max_quantity: u32,
    ) -> DemandNode {
        let mut node = DemandNode {
            item_id: item.id,
            selected_recipe_index: recipe_index,
            min_quantity,
            max_quantity,
            ancestor_path,
            loop_detected: false,
            children: Vec::new(),
        };

        let Some(recipe) = item.recipes.get(recipe_index as usize) else {
            return node;
        };
        let output = yield_range(recipe);

        // Every ingredient is checked before any is expanded; a repeat of an
        // ancestor or of an earlier ingredient stops the whole node.
        let mut seen = node.ancestor_path.clone();
        if let Some(repeat) = recipe
            .consumed_items
            .iter()
            .find(|consumed| !seen.insert(consumed.item_id))
        {
            debug!(
                "loop at item {} recipe {}: {} already on this branch",
                item.id, recipe_index, repeat.item_id
            );
            node.loop_detected = true;
            return node;
        }

        for consumed in &recipe.consumed_items {
            let Some(child_item) = self.catalog.lookup(consumed.item_id) else {
                debug!("item {} consumes unknown item {}, skipping", item.id, consumed.item_id);
                continue;
            };
            let (child_min, child_max) =
                ingredient_demand(min_quantity, max_quantity, output, consumed.quantity);

            let mut child_path = node.ancestor_path.clone();
            child_path.insert(consumed.item_id);
            node.children
                .push(self.build(child_item, 0, child_path, child_min, child_max));
        }

        debug!(
            "expanded item {} recipe {} ({}) into {} children",
            item.id,
            recipe_index,
            quantity_string(min_quantity, max_quantity),
            node.children.len()
        );
        node
    }
}

/// Accumulated demand for one leaf item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialTotal {
    pub item_id: u64,
    pub name: String,
    pub min_quantity: u32,
    pub max_quantity: u32, // 0 = unbounded
}

/// Summary of a demand tree
#[derive(Debug)]
pub struct DemandSummary {
    pub target: String,
    pub min_quantity: u32,
    pub max_quantity: u32,
    pub node_count: usize,
    pub raw_materials: Vec<MaterialTotal>,
    pub loops: Vec<(u64, String)>,
}

/// Total up the leaves of a demand tree
///
/// Loop-flagged nodes are reported separately instead of being counted as
/// materials.
pub fn summarize<C: Catalog + ?Sized>(root: &DemandNode, catalog: &C) -> DemandSummary {
    let name_of = |id: u64| {
        catalog
            .lookup(id)
            .map_or_else(|| format!("#{}", id), |item| item.name.clone())
    };

    let mut totals: BTreeMap<u64, (u32, Option<u32>)> = BTreeMap::new();
    let mut loops = Vec::new();

    root.walk(&mut |node, _| {
        if node.loop_detected {
            loops.push(node.item_id);
        } else if node.is_leaf() {
            let entry = totals.entry(node.item_id).or_insert((0, Some(0)));
            entry.0 = entry.0.saturating_add(node.min_quantity);
            entry.1 = match (entry.1, node.max_quantity) {
                (Some(total), max) if max > 0 => Some(total.saturating_add(max)),
                _ => None,
            };
        }
    });

    let raw_materials = totals
        .into_iter()
        .map(|(item_id, (min, max))| MaterialTotal {
            item_id,
            name: name_of(item_id),
            min_quantity: min,
            max_quantity: max.unwrap_or(0),
        })
        .collect();

    DemandSummary {
        target: name_of(root.item_id),
        min_quantity: root.min_quantity,
        max_quantity: root.max_quantity,
        node_count: root.node_count(),
        raw_materials,
        loops: loops.into_iter().map(|id| (id, name_of(id))).collect(),
    }
}

impl fmt::Display for DemandSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Demand Summary ===")?;
        writeln!(
            f,
            "Target: {} x{}",
            self.target,
            quantity_string(self.min_quantity, self.max_quantity)
        )?;
        writeln!(f, "Nodes: {}", self.node_count)?;
        writeln!(f)?;

        writeln!(f, "Materials to gather:")?;
        for material in &self.raw_materials {
            writeln!(
                f,
                "  {:>12}  {}",
                quantity_string(material.min_quantity, material.max_quantity),
                material.name
            )?;
        }

        if !self.loops.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recipe loops (not expanded):")?;
            for (id, name) in &self.loops {
                writeln!(f, "  {} (#{})", name, id)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemCatalog;
    use crate::models::{ConsumedItem, Rarity, YieldEntry};

    fn recipe(consumed: &[(u64, u32)], yields: &[(u32, f64)], multiplier: u32) -> Recipe {
        Recipe {
            consumed_items: consumed
                .iter()
                .map(|&(item_id, quantity)| ConsumedItem { item_id, quantity })
                .collect(),
            output_multiplier: multiplier,
            yield_distribution: yields
                .iter()
                .map(|&(count, weight)| YieldEntry { count, weight })
                .collect(),
            level_requirement: None,
        }
    }

    fn item(id: u64, recipes: Vec<Recipe>) -> ItemDefinition {
        ItemDefinition {
            id,
            name: format!("Item {}", id),
            generic_name: format!("Item {}", id),
            tier: -1,
            rarity: Rarity::Common,
            recipes,
        }
    }

    fn exact(consumed: &[(u64, u32)]) -> Recipe {
        recipe(consumed, &[(1, 1.0)], 1)
    }

    #[test]
    fn yield_range_equal_high_weights() {
        let r = recipe(&[], &[(1, 8.0), (2, 8.0)], 1);
        assert_eq!(yield_range(&r), OutputRange { min: 1, max: 2 });
    }

    #[test]
    fn yield_range_possible_zero_stays_zero() {
        let r = recipe(&[], &[(0, 2.0), (1, 1.0)], 1);
        assert_eq!(yield_range(&r), OutputRange { min: 0, max: 1 });
    }

    #[test]
    fn yield_range_empty_table_defaults_to_one() {
        let r = recipe(&[], &[], 3);
        assert_eq!(yield_range(&r), OutputRange { min: 3, max: 3 });
    }

    #[test]
    fn yield_range_exact_single_entry() {
        let r = recipe(&[], &[(4, 1.0)], 2);
        assert_eq!(yield_range(&r), OutputRange { min: 8, max: 8 });
    }

    #[test]
    fn yield_range_low_weight_raised_to_smallest_count() {
        // 0.5 reads as "possibly none", but the weights sum to 1.0, so the
        // smallest listed count is guaranteed
        let r = recipe(&[], &[(2, 0.5), (3, 0.5)], 1);
        assert_eq!(yield_range(&r), OutputRange { min: 2, max: 3 });
    }

    #[test]
    fn yield_range_low_total_weight_keeps_zero() {
        let r = recipe(&[], &[(2, 0.25)], 1);
        assert_eq!(yield_range(&r), OutputRange { min: 0, max: 2 });
    }

    #[test]
    fn yield_range_depends_on_entry_order() {
        let forward = recipe(&[], &[(1, 8.0), (2, 2.0)], 1);
        let backward = recipe(&[], &[(2, 2.0), (1, 8.0)], 1);
        assert_eq!(yield_range(&forward), OutputRange { min: 1, max: 2 });
        assert_eq!(yield_range(&backward), OutputRange { min: 1, max: 1 });
    }

    #[test]
    fn ingredient_demand_uses_ceil_division() {
        let output = OutputRange { min: 1, max: 2 };
        assert_eq!(ingredient_demand(3, 3, output, 2), (4, 6));
        assert_eq!(ingredient_demand(0, 0, output, 2), (0, 0));
    }

    #[test]
    fn ingredient_demand_unbounded_when_output_may_be_zero() {
        let output = OutputRange { min: 0, max: 1 };
        assert_eq!(ingredient_demand(5, 5, output, 3), (15, 0));
    }

    #[test]
    fn ingredient_demand_zero_max_output_divides_by_one() {
        let output = OutputRange { min: 0, max: 0 };
        assert_eq!(ingredient_demand(4, 4, output, 2), (8, 0));
    }

    #[test]
    fn ingredient_demand_saturates() {
        let output = OutputRange { min: 1, max: 1 };
        assert_eq!(ingredient_demand(u32::MAX, u32::MAX, output, 2), (u32::MAX, u32::MAX));
    }

    #[test]
    fn expand_propagates_ranges() {
        let catalog: ItemCatalog = [
            item(1, vec![recipe(&[(2, 2)], &[(1, 8.0), (2, 8.0)], 1)]),
            item(2, vec![]),
        ]
        .into_iter()
        .collect();

        let root = Planner::new(&catalog).expand_root(1, 3).unwrap();
        assert_eq!(root.quantity_range(), (3, 3));
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].quantity_range(), (4, 6));
        assert_eq!(root.children()[0].ancestor_path(), &BTreeSet::from([1, 2]));
    }

    #[test]
    fn expand_unknown_root_is_an_error() {
        let catalog = ItemCatalog::new();
        assert_eq!(
            Planner::new(&catalog).expand_root(9, 1),
            Err(PlanError::UnknownItem(9))
        );
    }

    #[test]
    fn unknown_ingredients_are_dropped() {
        let catalog: ItemCatalog = [item(1, vec![exact(&[(2, 1), (99, 1), (3, 1)])]), item(2, vec![]), item(3, vec![])]
            .into_iter()
            .collect();

        let root = Planner::new(&catalog).expand_root(1, 1).unwrap();
        let ids: Vec<u64> = root.children().iter().map(DemandNode::item_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(!root.loop_detected());
    }

    #[test]
    fn recipe_index_out_of_range_is_a_leaf() {
        let catalog: ItemCatalog = [item(1, vec![exact(&[(2, 1)])]), item(2, vec![])]
            .into_iter()
            .collect();

        let node = Planner::new(&catalog)
            .expand(1, 1, BTreeSet::from([1]), 5, 5)
            .unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.selected_recipe_index(), 1);
    }

    #[test]
    fn two_item_cycle_is_truncated_one_level_down() {
        let catalog: ItemCatalog = [item(1, vec![exact(&[(2, 1)])]), item(2, vec![exact(&[(1, 1)])])]
            .into_iter()
            .collect();

        let root = Planner::new(&catalog).expand_root(1, 1).unwrap();
        assert!(!root.loop_detected());
        let b = &root.children()[0];
        assert_eq!(b.item_id(), 2);
        assert!(b.loop_detected());
        assert!(b.is_leaf());
    }

    #[test]
    fn self_consuming_recipe_loops_at_root() {
        let catalog: ItemCatalog = [item(1, vec![exact(&[(2, 1), (1, 1)])]), item(2, vec![])]
            .into_iter()
            .collect();

        let root = Planner::new(&catalog).expand_root(1, 1).unwrap();
        assert!(root.loop_detected());
        assert!(root.is_leaf());
    }

    #[test]
    fn duplicate_ingredient_counts_as_loop() {
        let catalog: ItemCatalog = [item(1, vec![exact(&[(2, 1), (2, 3)])]), item(2, vec![])]
            .into_iter()
            .collect();

        let root = Planner::new(&catalog).expand_root(1, 1).unwrap();
        assert!(root.loop_detected());
    }

    #[test]
    fn shared_ingredient_in_separate_branches_is_not_a_loop() {
        let catalog: ItemCatalog = [
            item(1, vec![exact(&[(2, 1), (3, 1)])]),
            item(2, vec![exact(&[(4, 2)])]),
            item(3, vec![exact(&[(4, 3)])]),
            item(4, vec![]),
        ]
        .into_iter()
        .collect();

        let root = Planner::new(&catalog).expand_root(1, 2).unwrap();
        let mut loops = 0;
        root.walk(&mut |node, _| loops += usize::from(node.loop_detected()));
        assert_eq!(loops, 0);
        assert_eq!(root.node_at(&[0, 0]).unwrap().quantity_range(), (4, 4));
        assert_eq!(root.node_at(&[1, 0]).unwrap().quantity_range(), (6, 6));
    }

    #[test]
    fn reexpand_at_replaces_only_the_target_subtree() {
        let catalog: ItemCatalog = [
            item(1, vec![exact(&[(2, 1), (3, 1)])]),
            item(2, vec![exact(&[(4, 1)]), exact(&[(5, 2)])]),
            item(3, vec![exact(&[(4, 1)])]),
            item(4, vec![]),
            item(5, vec![]),
        ]
        .into_iter()
        .collect();
        let planner = Planner::new(&catalog);

        let mut root = planner.expand_root(1, 2).unwrap();
        let sibling_before = root.children()[1].clone();

        planner.reexpand_at(&mut root, &[0], 1, 2, 2).unwrap();

        let changed = &root.children()[0];
        assert_eq!(changed.selected_recipe_index(), 1);
        assert_eq!(changed.children()[0].item_id(), 5);
        assert_eq!(changed.children()[0].quantity_range(), (4, 4));
        assert_eq!(changed.ancestor_path(), &BTreeSet::from([1, 2]));
        assert_eq!(root.children()[1], sibling_before);
        assert_eq!(root.quantity_range(), (2, 2));
    }

    #[test]
    fn reexpand_at_rejects_bad_paths() {
        let catalog: ItemCatalog = [item(1, vec![])].into_iter().collect();
        let planner = Planner::new(&catalog);
        let mut root = planner.expand_root(1, 1).unwrap();

        assert_eq!(
            planner.reexpand_at(&mut root, &[0, 1], 0, 1, 1),
            Err(PlanError::NoSuchNode(vec![0, 1]))
        );
    }

    #[test]
    fn change_recipe_and_quantity_skip_no_ops() {
        let catalog: ItemCatalog = [
            item(1, vec![exact(&[(2, 1)]), exact(&[(3, 1)])]),
            item(2, vec![]),
            item(3, vec![]),
        ]
        .into_iter()
        .collect();
        let planner = Planner::new(&catalog);
        let mut root = planner.expand_root(1, 4).unwrap();

        assert_eq!(planner.change_recipe_at(&mut root, &[], 0), Ok(false));
        assert_eq!(planner.change_recipe_at(&mut root, &[], 1), Ok(true));
        assert_eq!(root.children()[0].item_id(), 3);
        assert_eq!(root.children()[0].quantity_range(), (4, 4));

        assert_eq!(planner.change_quantity_at(&mut root, &[], 4), Ok(false));
        assert_eq!(planner.change_quantity_at(&mut root, &[], 7), Ok(true));
        assert_eq!(root.selected_recipe_index(), 1);
        assert_eq!(root.children()[0].quantity_range(), (7, 7));
    }

    #[test]
    fn summary_totals_leaves_and_lists_loops() {
        let catalog: ItemCatalog = [
            item(1, vec![exact(&[(2, 1), (3, 1), (5, 1)])]),
            item(2, vec![recipe(&[(4, 2)], &[(0, 2.0), (1, 1.0)], 1)]),
            item(3, vec![exact(&[(4, 3)])]),
            item(4, vec![]),
            item(5, vec![exact(&[(1, 1)])]),
        ]
        .into_iter()
        .collect();

        let root = Planner::new(&catalog).expand_root(1, 2).unwrap();
        let summary = summarize(&root, &catalog);

        assert_eq!(summary.node_count, 6);
        assert_eq!(
            summary.raw_materials,
            vec![MaterialTotal {
                item_id: 4,
                name: "Item 4".to_string(),
                min_quantity: 10,
                max_quantity: 0,
            }]
        );
        assert_eq!(summary.loops, vec![(5, "Item 5".to_string())]);

        let text = summary.to_string();
        assert!(text.contains("Target: Item 1 x2"));
        assert!(text.contains("≥ 10"));
        assert!(text.contains("Item 5 (#5)"));
    }
}
