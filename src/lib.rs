//! Crafting demand calculator
//!
//! Given a catalog of items and recipes, builds the tree of intermediate
//! materials and raw resources needed for a target item, with min/max
//! quantities on every node.

pub mod calculator;
pub mod catalog;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;

pub use calculator::{Planner, summarize, yield_range};
pub use catalog::{Catalog, ItemCatalog};
pub use error::{ImportError, PlanError};
pub use export::quantity_string;
pub use models::{ConsumedItem, DemandNode, ItemDefinition, Rarity, Recipe, YieldEntry};
