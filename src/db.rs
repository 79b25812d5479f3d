//! Database schema and catalog persistence

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, params};

use crate::catalog::ItemCatalog;
use crate::models::{ConsumedItem, ItemDefinition, Rarity, Recipe, SkillRequirement, YieldEntry};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item definitions; ids are stored as the bit pattern of the u64
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            generic_name TEXT NOT NULL,
            tier INTEGER NOT NULL DEFAULT -1,
            rarity TEXT NOT NULL DEFAULT 'default'
        );

        -- Recipe variants, in the order the game lists them
        CREATE TABLE IF NOT EXISTS recipes (
            item_id INTEGER NOT NULL,
            recipe_index INTEGER NOT NULL,
            output_multiplier INTEGER NOT NULL,
            skill TEXT,
            skill_level INTEGER,
            PRIMARY KEY (item_id, recipe_index)
        );

        CREATE TABLE IF NOT EXISTS recipe_inputs (
            item_id INTEGER NOT NULL,
            recipe_index INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            consumed_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (item_id, recipe_index, ordinal)
        );

        -- Yield tables keep their source order; output inference depends on it
        CREATE TABLE IF NOT EXISTS recipe_yields (
            item_id INTEGER NOT NULL,
            recipe_index INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            count INTEGER NOT NULL,
            weight REAL NOT NULL,
            PRIMARY KEY (item_id, recipe_index, ordinal)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_consumed ON recipe_inputs(consumed_id);
        "#,
    )?;
    Ok(())
}

fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

/// Insert or replace an item together with all of its recipes
pub fn upsert_item(conn: &Connection, item: &ItemDefinition) -> Result<()> {
    let id = to_sql_id(item.id);
    conn.execute(
        "INSERT OR REPLACE INTO items (id, name, generic_name, tier, rarity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            &item.name,
            &item.generic_name,
            item.tier,
            item.rarity.name().to_lowercase()
        ],
    )?;

    conn.execute("DELETE FROM recipes WHERE item_id = ?1", [id])?;
    conn.execute("DELETE FROM recipe_inputs WHERE item_id = ?1", [id])?;
    conn.execute("DELETE FROM recipe_yields WHERE item_id = ?1", [id])?;

    for (recipe_index, recipe) in item.recipes.iter().enumerate() {
        let recipe_index = recipe_index as u32;
        let (skill, level) = match &recipe.level_requirement {
            Some(req) => (Some(req.skill.as_str()), Some(req.level)),
            None => (None, None),
        };
        conn.execute(
            "INSERT INTO recipes (item_id, recipe_index, output_multiplier, skill, skill_level)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, recipe_index, recipe.output_multiplier, skill, level],
        )?;

        for (ordinal, consumed) in recipe.consumed_items.iter().enumerate() {
            conn.execute(
                "INSERT INTO recipe_inputs (item_id, recipe_index, ordinal, consumed_id, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    recipe_index,
                    ordinal as u32,
                    to_sql_id(consumed.item_id),
                    consumed.quantity
                ],
            )?;
        }

        for (ordinal, entry) in recipe.yield_distribution.iter().enumerate() {
            conn.execute(
                "INSERT INTO recipe_yields (item_id, recipe_index, ordinal, count, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, recipe_index, ordinal as u32, entry.count, entry.weight],
            )?;
        }
    }
    Ok(())
}

/// Clear the whole catalog (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_yields;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

pub fn count_items(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Load every item and recipe into memory
pub fn load_catalog(conn: &Connection) -> Result<ItemCatalog> {
    let mut items: BTreeMap<u64, ItemDefinition> = BTreeMap::new();

    let mut stmt = conn.prepare("SELECT id, name, generic_name, tier, rarity FROM items")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            from_sql_id(row.get(0)?),
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;
    for row in rows {
        let (id, name, generic_name, tier, rarity) = row?;
        let rarity = rarity
            .parse::<Rarity>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("item {} has a bad rarity", id))?;
        items.insert(
            id,
            ItemDefinition {
                id,
                name,
                generic_name,
                tier,
                rarity,
                recipes: Vec::new(),
            },
        );
    }

    let mut stmt = conn.prepare(
        "SELECT item_id, output_multiplier, skill, skill_level
         FROM recipes
         ORDER BY item_id, recipe_index",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            from_sql_id(row.get(0)?),
            row.get::<_, u32>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<u32>>(3)?,
        ))
    })?;
    for row in rows {
        let (item_id, output_multiplier, skill, level) = row?;
        let Some(item) = items.get_mut(&item_id) else {
            debug!("recipe for missing item {}", item_id);
            continue;
        };
        item.recipes.push(Recipe {
            consumed_items: Vec::new(),
            output_multiplier,
            yield_distribution: Vec::new(),
            level_requirement: skill.map(|skill| SkillRequirement {
                skill,
                level: level.unwrap_or(0),
            }),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT item_id, recipe_index, consumed_id, quantity
         FROM recipe_inputs
         ORDER BY item_id, recipe_index, ordinal",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            from_sql_id(row.get(0)?),
            row.get::<_, u32>(1)?,
            ConsumedItem {
                item_id: from_sql_id(row.get(2)?),
                quantity: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (item_id, recipe_index, consumed) = row?;
        if let Some(recipe) = recipe_mut(&mut items, item_id, recipe_index) {
            recipe.consumed_items.push(consumed);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT item_id, recipe_index, count, weight
         FROM recipe_yields
         ORDER BY item_id, recipe_index, ordinal",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            from_sql_id(row.get(0)?),
            row.get::<_, u32>(1)?,
            YieldEntry {
                count: row.get(2)?,
                weight: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (item_id, recipe_index, entry) = row?;
        if let Some(recipe) = recipe_mut(&mut items, item_id, recipe_index) {
            recipe.yield_distribution.push(entry);
        }
    }

    debug!("loaded {} items from database", items.len());
    Ok(items.into_values().collect())
}

fn recipe_mut(
    items: &mut BTreeMap<u64, ItemDefinition>,
    item_id: u64,
    recipe_index: u32,
) -> Option<&mut Recipe> {
    items
        .get_mut(&item_id)
        .and_then(|item| item.recipes.get_mut(recipe_index as usize))
}
