//! Shared catalog builders for integration tests.

#![allow(dead_code)]

use craft_planner::{ConsumedItem, DemandNode, ItemCatalog, ItemDefinition, Rarity, Recipe, YieldEntry};

pub fn recipe(consumed: &[(u64, u32)], yields: &[(u32, f64)], multiplier: u32) -> Recipe {
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

/// Recipe producing exactly one unit per craft
pub fn exact(consumed: &[(u64, u32)]) -> Recipe {
    recipe(consumed, &[(1, 1.0)], 1)
}

pub fn item(id: u64, recipes: Vec<Recipe>) -> ItemDefinition {
    ItemDefinition {
        id,
        name: format!("Item {}", id),
        generic_name: format!("Item {}", id),
        tier: 1,
        rarity: Rarity::Common,
        recipes,
    }
}

pub fn catalog(items: Vec<ItemDefinition>) -> ItemCatalog {
    items.into_iter().collect()
}

/// Child-index paths of every node, pre-order
pub fn node_paths(root: &DemandNode) -> Vec<Vec<usize>> {
    fn collect(node: &DemandNode, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        out.push(path.clone());
        for (index, child) in node.children().iter().enumerate() {
            path.push(index);
            collect(child, path, out);
            path.pop();
        }
    }

    let mut out = Vec::new();
    collect(root, &mut Vec::new(), &mut out);
    out
}
