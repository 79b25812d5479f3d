//! Presentation helpers: quantity strings, labels and tree export

use serde::Serialize;

use crate::catalog::Catalog;
use crate::models::{DemandNode, ItemDefinition};

const ROW_LABEL_WIDTH: usize = 52;

/// Render a demand range: `5`, `≥ 3` (no upper bound) or `2—7`
pub fn quantity_string(min_quantity: u32, max_quantity: u32) -> String {
    if max_quantity == min_quantity {
        group_thousands(min_quantity)
    } else if max_quantity == 0 {
        format!("≥ {}", group_thousands(min_quantity))
    } else {
        format!(
            "{}—{}",
            group_thousands(min_quantity),
            group_thousands(max_quantity)
        )
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Tree row label: `Rough Plank (T1)`, or just the name for tierless items
pub fn item_label(item: &ItemDefinition) -> String {
    if item.tier > -1 {
        format!("{} (T{})", item.name, item.tier)
    } else {
        item.name.clone()
    }
}

/// Short title for a planned item: `T1 Plank`
pub fn tab_title(item: &ItemDefinition) -> String {
    let title = if item.tier > -1 {
        format!("T{} {}", item.tier, item.generic_name)
    } else {
        item.name.clone()
    };
    title.replace(':', "")
}

pub fn loop_message(label: &str) -> String {
    format!(
        "Selected recipe for {} requires items that are already present on this branch of the crafting tree, creating an infinite loop.",
        label
    )
}

fn node_label<C: Catalog + ?Sized>(node: &DemandNode, catalog: &C) -> String {
    catalog
        .lookup(node.item_id())
        .map_or_else(|| format!("#{}", node.item_id()), item_label)
}

/// Markdown export: bold title line, then every descendant in a code block
pub fn tree_as_text<C: Catalog + ?Sized>(root: &DemandNode, catalog: &C) -> String {
    let (min, max) = root.quantity_range();
    let mut text = format!(
        "**{} x{}**\n\n```\n",
        node_label(root, catalog),
        quantity_string(min, max)
    );
    write_rows(root, catalog, &mut Vec::new(), false, &mut text);
    text.push_str("```");
    text
}

/// Plain export including the root row; loop nodes carry a `[loop]` marker
pub fn tree_as_plain_text<C: Catalog + ?Sized>(root: &DemandNode, catalog: &C) -> String {
    let mut text = String::new();
    push_row(root, catalog, "", true, &mut text);
    write_rows(root, catalog, &mut Vec::new(), true, &mut text);
    text
}

fn write_rows<C: Catalog + ?Sized>(
    node: &DemandNode,
    catalog: &C,
    indents: &mut Vec<bool>,
    mark_loops: bool,
    text: &mut String,
) {
    let last = node.children().len().saturating_sub(1);
    for (index, child) in node.children().iter().enumerate() {
        let prefix: String = indents
            .iter()
            .map(|&more| if more { "| " } else { "  " })
            .collect();
        push_row(child, catalog, &prefix, mark_loops, text);

        indents.push(index != last);
        write_rows(child, catalog, indents, mark_loops, text);
        indents.pop();
    }
}

fn push_row<C: Catalog + ?Sized>(
    node: &DemandNode,
    catalog: &C,
    prefix: &str,
    mark_loops: bool,
    text: &mut String,
) {
    let label = format!("{}{}", prefix, node_label(node, catalog));
    let padded: String = label
        .chars()
        .chain(std::iter::repeat(' '))
        .take(ROW_LABEL_WIDTH)
        .collect();
    let (min, max) = node.quantity_range();

    text.push_str(&padded);
    text.push(' ');
    text.push_str(&quantity_string(min, max));
    if mark_loops && node.loop_detected() {
        text.push_str(" [loop]");
    }
    text.push('\n');
}

#[derive(Serialize)]
struct JsonNode {
    item_id: u64,
    name: String,
    recipe_index: u32,
    min_quantity: u32,
    max_quantity: u32,
    quantity: String,
    loop_detected: bool,
    children: Vec<JsonNode>,
}

impl JsonNode {
    fn from_node<C: Catalog + ?Sized>(node: &DemandNode, catalog: &C) -> Self {
        let (min, max) = node.quantity_range();
        JsonNode {
            item_id: node.item_id(),
            name: node_label(node, catalog),
            recipe_index: node.selected_recipe_index(),
            min_quantity: min,
            max_quantity: max,
            quantity: quantity_string(min, max),
            loop_detected: node.loop_detected(),
            children: node
                .children()
                .iter()
                .map(|child| JsonNode::from_node(child, catalog))
                .collect(),
        }
    }
}

/// Pretty-printed JSON of the tree with labels and rendered quantities
pub fn tree_as_json<C: Catalog + ?Sized>(
    root: &DemandNode,
    catalog: &C,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonNode::from_node(root, catalog))
}
