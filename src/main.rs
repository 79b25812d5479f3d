//! Crafting Demand Calculator
//!
//! Plans the ingredient tree for a crafted item from a catalog database.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use regex::Regex;
use rusqlite::Connection;

use craft_planner::calculator::{Planner, summarize, yield_range};
use craft_planner::catalog::{Catalog, ItemCatalog};
use craft_planner::export::{self, item_label, loop_message, quantity_string, tab_title};
use craft_planner::models::{ConsumedItem, ItemDefinition, Rarity, Recipe, SkillRequirement, YieldEntry};
use craft_planner::{db, extract};

#[derive(Parser)]
#[command(name = "craft-planner")]
#[command(about = "Ingredient trees with quantity ranges for crafted items")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, env = "CRAFT_PLANNER_DB", default_value = "craft_planner.db")]
    database: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import item data from a directory of JSON files
    Import {
        /// Directory to scan for *.json data files
        data_dir: PathBuf,

        /// Clear existing items before import
        #[arg(long)]
        clear: bool,
    },

    /// Load a small sample catalog (without game data)
    LoadSample,

    /// Find items by name (regular expression)
    Search {
        pattern: String,
    },

    /// Show details for a specific item
    Item {
        id: u64,
    },

    /// Build the ingredient tree for an item
    Plan {
        /// Item id to craft
        id: u64,

        /// Quantity to craft
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Recipe variant for the target item (0-based)
        #[arg(short, long, default_value_t = 0)]
        recipe: u32,

        /// Recipe variant for a node deeper in the tree, e.g. `0.1=2`
        /// (dot-separated child indices, or `root`)
        #[arg(long = "variant", value_parser = parse_variant)]
        variants: Vec<VariantChoice>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Markdown)]
        format: Format,

        /// Print raw material totals after the tree
        #[arg(short, long)]
        summary: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Text,
    Json,
}

#[derive(Debug, Clone)]
struct VariantChoice {
    path: Vec<usize>,
    recipe: u32,
}

fn parse_variant(s: &str) -> Result<VariantChoice, String> {
    let re = Regex::new(r"^(root|\d+(?:\.\d+)*)=(\d+)$").map_err(|e| e.to_string())?;
    let cap = re
        .captures(s.trim())
        .ok_or_else(|| format!("expected PATH=RECIPE, got '{}'", s))?;

    let path = if &cap[1] == "root" {
        Vec::new()
    } else {
        cap[1]
            .split('.')
            .map(|part| part.parse::<usize>().map_err(|e| e.to_string()))
            .collect::<Result<_, _>>()?
    };
    let recipe = cap[2].parse::<u32>().map_err(|e| e.to_string())?;
    Ok(VariantChoice { path, recipe })
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("opening {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { data_dir, clear } => {
            if clear {
                println!("Clearing existing items...");
                db::clear_catalog(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &data_dir)?;
            println!("\n{}", stats);
        }

        Commands::LoadSample => {
            let count = load_sample_data(&conn)?;
            println!("Loaded {} sample items", count);
        }

        Commands::Search { pattern } => {
            let re = Regex::new(&pattern).with_context(|| format!("bad pattern '{}'", pattern))?;
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("No items in database. Run 'import' or 'load-sample' first.");
                return Ok(());
            }

            println!("{:>8}  {:<40} {:<10} {:>7}", "ID", "Item", "Rarity", "Recipes");
            println!("{}", "-".repeat(68));
            for item in catalog.search(&re) {
                println!(
                    "{:>8}  {:<40} {:<10} {:>7}",
                    item.id,
                    item_label(item),
                    item.rarity,
                    item.recipes.len()
                );
            }
        }

        Commands::Item { id } => {
            let catalog = db::load_catalog(&conn)?;
            let item = catalog
                .lookup(id)
                .ok_or_else(|| anyhow!("Item {} not found", id))?;
            print_item(item, &catalog);
        }

        Commands::Plan {
            id,
            quantity,
            recipe,
            variants,
            format,
            summary,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let planner = Planner::new(&catalog);

            let mut tree = planner.expand_root(id, quantity)?;
            planner.change_recipe_at(&mut tree, &[], recipe)?;
            for choice in &variants {
                planner
                    .change_recipe_at(&mut tree, &choice.path, choice.recipe)
                    .with_context(|| format!("applying --variant for node {:?}", choice.path))?;
            }

            match format {
                Format::Markdown => println!("{}", export::tree_as_text(&tree, &catalog)),
                Format::Text => print!("{}", export::tree_as_plain_text(&tree, &catalog)),
                Format::Json => println!("{}", export::tree_as_json(&tree, &catalog)?),
            }

            tree.walk(&mut |node, _| {
                if node.loop_detected() {
                    if let Some(item) = catalog.lookup(node.item_id()) {
                        eprintln!("warning: {}", loop_message(&item_label(item)));
                    }
                }
            });

            if summary {
                println!("\n{}", summarize(&tree, &catalog));
            }
        }
    }

    Ok(())
}

fn print_item(item: &ItemDefinition, catalog: &ItemCatalog) {
    println!("Item: {}", item_label(item));
    println!("  ID: {}", item.id);
    println!("  Title: {}", tab_title(item));
    if item.tier > -1 {
        println!("  Tier: {}", item.tier);
    }
    println!("  Rarity: {}", item.rarity);

    if item.is_raw() {
        println!("  Raw resource (no recipes)");
        return;
    }

    for (index, recipe) in item.recipes.iter().enumerate() {
        let output = yield_range(recipe);
        println!(
            "  Recipe {}: yields {} per craft",
            index,
            quantity_string(output.min, output.max)
        );
        if let Some(req) = &recipe.level_requirement {
            println!("    Requires: {} Lv. {}", req.skill, req.level);
        }
        for consumed in &recipe.consumed_items {
            let name = catalog
                .lookup(consumed.item_id)
                .map_or_else(|| format!("unknown item #{}", consumed.item_id), item_label);
            println!("    {} x{}", name, consumed.quantity);
        }
    }
}

/// Load a small sample catalog for trying the planner without game data
fn load_sample_data(conn: &Connection) -> Result<usize> {
    db::clear_catalog(conn)?;

    let raw = |id: u64, name: &str, tier: i32| ItemDefinition {
        id,
        name: name.to_string(),
        generic_name: name.to_string(),
        tier,
        rarity: Rarity::Common,
        recipes: Vec::new(),
    };
    let recipe = |consumed: &[(u64, u32)], yields: &[(u32, f64)], skill: &str, level: u32| Recipe {
        consumed_items: consumed
            .iter()
            .map(|&(item_id, quantity)| ConsumedItem { item_id, quantity })
            .collect(),
        output_multiplier: 1,
        yield_distribution: yields
            .iter()
            .map(|&(count, weight)| YieldEntry { count, weight })
            .collect(),
        level_requirement: Some(SkillRequirement {
            skill: skill.to_string(),
            level,
        }),
    };

    let items = vec![
        raw(1, "Rough Wood Log", 1),
        raw(2, "Rough Pebbles", 1),
        raw(3, "Water Bucket", -1),
        ItemDefinition {
            id: 10,
            name: "Rough Wood Plank".to_string(),
            generic_name: "Plank".to_string(),
            tier: 1,
            rarity: Rarity::Common,
            recipes: vec![
                recipe(&[(1, 1)], &[(1, 8.0), (2, 8.0)], "Carpentry", 1),
                recipe(&[(11, 2)], &[(1, 1.0)], "Carpentry", 1),
            ],
        },
        // Reclaiming planks from stripped wood closes a loop with the plank recipe
        ItemDefinition {
            id: 11,
            name: "Stripped Wood".to_string(),
            generic_name: "Stripped Wood".to_string(),
            tier: 1,
            rarity: Rarity::Common,
            recipes: vec![recipe(&[(10, 1)], &[(1, 1.0)], "Carpentry", 1)],
        },
        ItemDefinition {
            id: 12,
            name: "Rough Brick".to_string(),
            generic_name: "Brick".to_string(),
            tier: 1,
            rarity: Rarity::Common,
            recipes: vec![recipe(&[(2, 4), (3, 1)], &[(0, 2.0), (1, 1.0)], "Masonry", 2)],
        },
        ItemDefinition {
            id: 20,
            name: "Rough Building Frame".to_string(),
            generic_name: "Building Frame".to_string(),
            tier: 1,
            rarity: Rarity::Uncommon,
            recipes: vec![recipe(&[(10, 3), (12, 2), (99, 1)], &[(1, 1.0)], "Construction", 3)],
        },
    ];

    for item in &items {
        db::upsert_item(conn, item)?;
    }
    Ok(items.len())
}
