//! Read-only context shared by every phase of one check.

use flowref_core::{Item, ItemId, ItemTable};

#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub items: &'a ItemTable,
    /// Name of the enclosing function, for rendering `F'Result`.
    pub function: Option<&'a str>,
}

impl<'a> CheckContext<'a> {
    pub fn new(items: &'a ItemTable) -> Self {
        Self {
            items,
            function: None,
        }
    }

    pub fn with_function(items: &'a ItemTable, function: Option<&'a str>) -> Self {
        Self { items, function }
    }

    pub fn name(&self, item: Item) -> String {
        match item {
            Item::Null => "null".to_string(),
            Item::FunctionResult => format!("{}'Result", self.function.unwrap_or("")),
            Item::Entity(id) => self.items.name(id).to_string(),
        }
    }

    pub fn entity_name(&self, id: ItemId) -> String {
        self.items.name(id).to_string()
    }

    /// True when `item` is an entity that is a (transitive) constituent of
    /// `state`.
    pub fn is_constituent_of(&self, item: Item, state: ItemId) -> bool {
        item.entity()
            .is_some_and(|id| self.items.is_constituent_of(id, state))
    }

    pub fn null_refined_state(&self, item: Item) -> Option<ItemId> {
        item.entity()
            .filter(|id| self.items.is_state(*id) && self.items.has_null_refinement(*id))
    }

    pub fn non_null_refined_state(&self, item: Item) -> Option<ItemId> {
        item.entity()
            .filter(|id| self.items.is_state(*id) && self.items.has_non_null_refinement(*id))
    }
}
