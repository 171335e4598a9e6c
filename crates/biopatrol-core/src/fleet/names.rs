//! Local name resolver for shelves and locations.
//!
//! A small local cache maps human names to ids without touching the
//! (assumed, external) RPC library directly: try a name match first,
//! then fall back to treating the input as a raw id.

use std::collections::HashMap;

use super::{Location, Shelf};

/// Caches `name -> id` for shelves and locations, refreshed from
/// `list_shelves`/`list_locations` at the start of each task execution.
/// A miss on both name and id lookup just returns the input unchanged
/// — callers pass raw ids through to the Fleet either way.
#[derive(Debug, Default, Clone)]
pub struct NameResolver {
    shelf_names: HashMap<String, String>,
    shelf_display: HashMap<String, String>,
    location_names: HashMap<String, String>,
    location_display: HashMap<String, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_shelves(&mut self, shelves: &[Shelf]) {
        self.shelf_names.clear();
        self.shelf_display.clear();
        for shelf in shelves {
            self.shelf_names.insert(shelf.name.clone(), shelf.id.clone());
            self.shelf_display.insert(shelf.id.clone(), shelf.name.clone());
        }
    }

    pub fn refresh_locations(&mut self, locations: &[Location]) {
        self.location_names.clear();
        self.location_display.clear();
        for location in locations {
            self.location_names
                .insert(location.name.clone(), location.id.clone());
            self.location_display
                .insert(location.id.clone(), location.name.clone());
        }
    }

    /// Resolve a shelf name or id to its canonical id. Tries a name match
    /// first, then assumes `name_or_id` is already an id.
    pub fn resolve_shelf_id(&self, name_or_id: &str) -> String {
        self.shelf_names
            .get(name_or_id)
            .cloned()
            .unwrap_or_else(|| name_or_id.to_string())
    }

    pub fn shelf_display_name(&self, id: &str) -> Option<&str> {
        self.shelf_display.get(id).map(String::as_str)
    }

    pub fn resolve_location_id(&self, name_or_id: &str) -> String {
        self.location_names
            .get(name_or_id)
            .cloned()
            .unwrap_or_else(|| name_or_id.to_string())
    }

    pub fn location_display_name(&self, id: &str) -> Option<&str> {
        self.location_display.get(id).map(String::as_str)
    }
}
