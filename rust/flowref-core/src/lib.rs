//! flowref Core
//!
//! Shared types used by the contract checker and its drivers: source spans,
//! interned names and the item model (parameters, objects, abstract states
//! and their refinements).

pub mod items;
pub mod span;
pub mod strings;

pub use items::{
    Entity, EntityKind, ExternalProperty, ExternalProps, Item, ItemId, ItemModelError, ItemTable,
    ObjectKind, ParamRole, Refinement,
};
pub use span::Span;
