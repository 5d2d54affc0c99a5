//! Item model: the resolved entities a flow or global contract can mention.
//!
//! Entities live in an arena ([`ItemTable`]) and are referred to by
//! [`ItemId`]. A constituent points back at the abstract state that
//! encapsulates it through an index, never through an owning pointer, so the
//! state ↔ constituent cycle is just two integers.
//!
//! The refinement of a state is set at most once (`None → Null | NonNull`)
//! when the body declaring it has been elaborated; every check afterwards only
//! reads the table.

use crate::span::Span;
use crate::strings::{NameTable, Symbol};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

// ── Identifiers ─────────────────────────────────────────────────────

/// Stable arena index of an entity in an [`ItemTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference appearing in a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    /// The `null` placeholder (no outputs / no inputs).
    Null,
    /// The `F'Result` pseudo-item of the enclosing function.
    FunctionResult,
    /// A parameter, object or abstract state.
    Entity(ItemId),
}

impl Item {
    pub fn is_null(self) -> bool {
        matches!(self, Item::Null)
    }

    pub fn entity(self) -> Option<ItemId> {
        match self {
            Item::Entity(id) => Some(id),
            _ => None,
        }
    }
}

impl From<ItemId> for Item {
    fn from(id: ItemId) -> Self {
        Item::Entity(id)
    }
}

// ── Entity kinds ────────────────────────────────────────────────────

/// Mode of a formal parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamRole {
    In,
    Out,
    InOut,
    GenericIn,
    GenericInOut,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectKind {
    Variable,
    Constant,
}

/// One of the four external (volatility) properties.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum ExternalProperty {
    #[strum(to_string = "Async_Readers", serialize = "async_readers")]
    AsyncReaders,
    #[strum(to_string = "Async_Writers", serialize = "async_writers")]
    AsyncWriters,
    #[strum(to_string = "Effective_Reads", serialize = "effective_reads")]
    EffectiveReads,
    #[strum(to_string = "Effective_Writes", serialize = "effective_writes")]
    EffectiveWrites,
}

/// External properties of a state or volatile object.
///
/// An `External` declaration without explicit properties enables all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ExternalProps {
    pub async_readers: bool,
    pub async_writers: bool,
    pub effective_reads: bool,
    pub effective_writes: bool,
}

impl ExternalProps {
    pub fn all() -> Self {
        Self {
            async_readers: true,
            async_writers: true,
            effective_reads: true,
            effective_writes: true,
        }
    }

    pub fn from_properties(props: &[ExternalProperty]) -> Self {
        if props.is_empty() {
            return Self::all();
        }
        let mut out = Self::default();
        for p in props {
            out.set(*p, true);
        }
        out
    }

    pub fn get(&self, prop: ExternalProperty) -> bool {
        match prop {
            ExternalProperty::AsyncReaders => self.async_readers,
            ExternalProperty::AsyncWriters => self.async_writers,
            ExternalProperty::EffectiveReads => self.effective_reads,
            ExternalProperty::EffectiveWrites => self.effective_writes,
        }
    }

    pub fn set(&mut self, prop: ExternalProperty, value: bool) {
        match prop {
            ExternalProperty::AsyncReaders => self.async_readers = value,
            ExternalProperty::AsyncWriters => self.async_writers = value,
            ExternalProperty::EffectiveReads => self.effective_reads = value,
            ExternalProperty::EffectiveWrites => self.effective_writes = value,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = ExternalProperty> + '_ {
        use strum::IntoEnumIterator;
        ExternalProperty::iter().filter(move |p| self.get(*p))
    }
}

/// Visible refinement of an abstract state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Refinement {
    /// No refinement visible at this point.
    #[default]
    None,
    /// `State => null`.
    Null,
    /// `State => (C1, C2, ...)`, in declaration order.
    NonNull(Vec<ItemId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Parameter {
        role: ParamRole,
    },
    Object {
        kind: ObjectKind,
        volatile: Option<ExternalProps>,
    },
    State {
        external: Option<ExternalProps>,
        refinement: Refinement,
    },
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: Symbol,
    pub span: Span,
    pub kind: EntityKind,
    /// Back-link to the state this entity is a constituent of.
    pub encapsulating_state: Option<ItemId>,
}

impl Entity {
    pub fn is_state(&self) -> bool {
        matches!(self.kind, EntityKind::State { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, EntityKind::Parameter { .. })
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Object {
                kind: ObjectKind::Constant,
                ..
            }
        )
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemModelError {
    #[error("'{name}' is already declared")]
    DuplicateDeclaration { name: String },
    #[error("no entity with id {id}")]
    UnknownItem { id: ItemId },
    #[error("'{name}' is not an abstract state")]
    NotAState { name: String },
    #[error("state '{name}' already has a refinement")]
    AlreadyRefined { name: String },
    #[error("'{constituent}' is already a constituent of state '{owner}'")]
    ConstituentAlreadyOwned { constituent: String, owner: String },
    #[error("'{name}' cannot be a constituent: {reason}")]
    InvalidConstituent { name: String, reason: String },
}

// ── Table ───────────────────────────────────────────────────────────

/// Arena of every entity known to one compilation unit.
#[derive(Debug, Default, Clone)]
pub struct ItemTable {
    names: NameTable,
    entities: Vec<Entity>,
    /// Package-level entities by name. Parameters are looked up through a
    /// subprogram scope instead.
    by_name: HashMap<Symbol, ItemId>,
}

impl ItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, kind: EntityKind, span: Span) -> ItemId {
        let sym = self.names.intern(name);
        let id = ItemId(self.entities.len() as u32);
        self.entities.push(Entity {
            name: sym,
            span,
            kind,
            encapsulating_state: None,
        });
        id
    }

    fn declare_named(
        &mut self,
        name: &str,
        kind: EntityKind,
        span: Span,
    ) -> Result<ItemId, ItemModelError> {
        if self.lookup(name).is_some() {
            return Err(ItemModelError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        let id = self.push(name, kind, span);
        self.by_name.insert(self.entities[id.index()].name, id);
        Ok(id)
    }

    pub fn declare_object(
        &mut self,
        name: &str,
        kind: ObjectKind,
        volatile: Option<ExternalProps>,
        span: Span,
    ) -> Result<ItemId, ItemModelError> {
        self.declare_named(name, EntityKind::Object { kind, volatile }, span)
    }

    pub fn declare_state(
        &mut self,
        name: &str,
        external: Option<ExternalProps>,
        span: Span,
    ) -> Result<ItemId, ItemModelError> {
        self.declare_named(
            name,
            EntityKind::State {
                external,
                refinement: Refinement::None,
            },
            span,
        )
    }

    /// Declare a formal parameter. It is not entered in the package-level
    /// name map; callers keep the returned id in their own scope.
    pub fn declare_parameter(&mut self, name: &str, role: ParamRole, span: Span) -> ItemId {
        self.push(name, EntityKind::Parameter { role }, span)
    }

    pub fn lookup(&self, name: &str) -> Option<ItemId> {
        let sym = self.names.get(name)?;
        self.by_name.get(&sym).copied()
    }

    pub fn try_entity(&self, id: ItemId) -> Result<&Entity, ItemModelError> {
        self.entities
            .get(id.index())
            .ok_or(ItemModelError::UnknownItem { id })
    }

    /// Ids are only minted by this table, so indexing cannot fail for ids
    /// obtained from it.
    pub fn entity(&self, id: ItemId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn name(&self, id: ItemId) -> &str {
        self.names
            .resolve(self.entity(id).name)
            .unwrap_or("<unnamed>")
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Package-level names, for "did you mean" suggestions.
    pub fn visible_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.by_name.values().map(|id| self.name(*id)).collect();
        out.sort_unstable();
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (ItemId(i as u32), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_state(&self, id: ItemId) -> bool {
        self.entity(id).is_state()
    }

    pub fn is_constant(&self, id: ItemId) -> bool {
        self.entity(id).is_constant()
    }

    pub fn external_props(&self, id: ItemId) -> Option<ExternalProps> {
        match &self.entity(id).kind {
            EntityKind::State { external, .. } => *external,
            EntityKind::Object { volatile, .. } => *volatile,
            EntityKind::Parameter { .. } => None,
        }
    }

    pub fn refinement(&self, id: ItemId) -> &Refinement {
        const NONE: &Refinement = &Refinement::None;
        match &self.entity(id).kind {
            EntityKind::State { refinement, .. } => refinement,
            _ => NONE,
        }
    }

    pub fn constituents(&self, state: ItemId) -> &[ItemId] {
        match self.refinement(state) {
            Refinement::NonNull(cs) => cs,
            _ => &[],
        }
    }

    pub fn encapsulating_state(&self, id: ItemId) -> Option<ItemId> {
        self.entity(id).encapsulating_state
    }

    /// True when `item` is a constituent of `state`, directly or through a
    /// chain of nested refinements.
    pub fn is_constituent_of(&self, item: ItemId, state: ItemId) -> bool {
        let mut current = self.encapsulating_state(item);
        let mut steps = 0;
        while let Some(owner) = current {
            if owner == state {
                return true;
            }
            steps += 1;
            if steps > self.entities.len() {
                break;
            }
            current = self.encapsulating_state(owner);
        }
        false
    }

    /// The concrete granularity at which `state` must be mentioned by a
    /// refined contract: its constituents, with every constituent that is
    /// itself a state with a visible non-null refinement replaced by its own
    /// leaves. Null-refined sub-states contribute nothing.
    pub fn visible_leaves(&self, state: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_leaves(state, &mut out, &mut seen);
        out
    }

    fn collect_leaves(&self, state: ItemId, out: &mut Vec<ItemId>, seen: &mut HashSet<ItemId>) {
        if !seen.insert(state) {
            return;
        }
        for &c in self.constituents(state) {
            match self.refinement(c) {
                Refinement::NonNull(_) => self.collect_leaves(c, out, seen),
                Refinement::Null => {}
                Refinement::None => out.push(c),
            }
        }
    }

    /// A state whose visible refinement is `null`, or whose refinement only
    /// bottoms out in null refinements.
    pub fn has_null_refinement(&self, id: ItemId) -> bool {
        match self.refinement(id) {
            Refinement::Null => true,
            Refinement::NonNull(_) => self.visible_leaves(id).is_empty(),
            Refinement::None => false,
        }
    }

    pub fn has_non_null_refinement(&self, id: ItemId) -> bool {
        matches!(self.refinement(id), Refinement::NonNull(_)) && !self.has_null_refinement(id)
    }

    /// Record the refinement of `state`. The transition is monotonic: a state
    /// that already has a refinement is rejected. On error the table is left
    /// untouched.
    pub fn set_refinement(
        &mut self,
        state: ItemId,
        refinement: Refinement,
    ) -> Result<(), ItemModelError> {
        let entity = self.try_entity(state)?;
        match &entity.kind {
            EntityKind::State {
                refinement: Refinement::None,
                ..
            } => {}
            EntityKind::State { .. } => {
                return Err(ItemModelError::AlreadyRefined {
                    name: self.name(state).to_string(),
                })
            }
            _ => {
                return Err(ItemModelError::NotAState {
                    name: self.name(state).to_string(),
                })
            }
        }

        if let Refinement::NonNull(constituents) = &refinement {
            let mut listed = HashSet::new();
            for &c in constituents {
                let ce = self.try_entity(c)?;
                if ce.is_parameter() {
                    return Err(ItemModelError::InvalidConstituent {
                        name: self.name(c).to_string(),
                        reason: "parameters cannot be constituents".to_string(),
                    });
                }
                if c == state || self.is_constituent_of(state, c) {
                    return Err(ItemModelError::InvalidConstituent {
                        name: self.name(c).to_string(),
                        reason: format!("it encloses state '{}'", self.name(state)),
                    });
                }
                if let Some(owner) = ce.encapsulating_state {
                    return Err(ItemModelError::ConstituentAlreadyOwned {
                        constituent: self.name(c).to_string(),
                        owner: self.name(owner).to_string(),
                    });
                }
                if !listed.insert(c) {
                    return Err(ItemModelError::ConstituentAlreadyOwned {
                        constituent: self.name(c).to_string(),
                        owner: self.name(state).to_string(),
                    });
                }
            }
            for &c in constituents {
                self.entities[c.index()].encapsulating_state = Some(state);
            }
        }

        if let EntityKind::State {
            refinement: slot, ..
        } = &mut self.entities[state.index()].kind
        {
            *slot = refinement;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(t: &mut ItemTable, name: &str) -> ItemId {
        t.declare_object(name, ObjectKind::Variable, None, Span::dummy())
            .unwrap()
    }

    fn state(t: &mut ItemTable, name: &str) -> ItemId {
        t.declare_state(name, None, Span::dummy()).unwrap()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "Sensor_State");
        assert_eq!(t.lookup("sensor_state"), Some(s));
        assert_eq!(t.name(s), "Sensor_State");
    }

    #[test]
    fn duplicate_declaration_rejected() {
        let mut t = ItemTable::new();
        var(&mut t, "X");
        let err = t
            .declare_state("x", None, Span::dummy())
            .unwrap_err();
        assert!(matches!(err, ItemModelError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn parameters_are_not_globally_visible() {
        let mut t = ItemTable::new();
        let p = t.declare_parameter("Y", ParamRole::Out, Span::dummy());
        assert!(t.lookup("Y").is_none());
        assert!(t.entity(p).is_parameter());
    }

    #[test]
    fn refinement_sets_back_links() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        let c1 = var(&mut t, "C1");
        let c2 = var(&mut t, "C2");
        t.set_refinement(s, Refinement::NonNull(vec![c1, c2])).unwrap();
        assert_eq!(t.encapsulating_state(c1), Some(s));
        assert!(t.is_constituent_of(c2, s));
        assert_eq!(t.constituents(s), &[c1, c2]);
        assert!(t.has_non_null_refinement(s));
    }

    #[test]
    fn refinement_is_monotonic() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        t.set_refinement(s, Refinement::Null).unwrap();
        let err = t.set_refinement(s, Refinement::Null).unwrap_err();
        assert!(matches!(err, ItemModelError::AlreadyRefined { .. }));
        assert!(t.has_null_refinement(s));
    }

    #[test]
    fn constituent_cannot_have_two_owners() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        let u = state(&mut t, "U");
        let c = var(&mut t, "C");
        t.set_refinement(s, Refinement::NonNull(vec![c])).unwrap();
        let err = t
            .set_refinement(u, Refinement::NonNull(vec![c]))
            .unwrap_err();
        assert!(matches!(err, ItemModelError::ConstituentAlreadyOwned { .. }));
        // The failed call left U unrefined.
        assert_eq!(t.refinement(u), &Refinement::None);
    }

    #[test]
    fn cyclic_refinement_rejected() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        let inner = state(&mut t, "Inner");
        t.set_refinement(s, Refinement::NonNull(vec![inner])).unwrap();
        let err = t
            .set_refinement(inner, Refinement::NonNull(vec![s]))
            .unwrap_err();
        assert!(matches!(err, ItemModelError::InvalidConstituent { .. }));
    }

    #[test]
    fn nested_leaves_and_transitive_membership() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        let inner = state(&mut t, "Inner");
        let empty = state(&mut t, "Empty");
        let a = var(&mut t, "A");
        let b = var(&mut t, "B");
        t.set_refinement(s, Refinement::NonNull(vec![inner, a, empty]))
            .unwrap();
        t.set_refinement(inner, Refinement::NonNull(vec![b])).unwrap();
        t.set_refinement(empty, Refinement::Null).unwrap();
        assert_eq!(t.visible_leaves(s), vec![b, a]);
        assert!(t.is_constituent_of(b, s));
        assert!(!t.is_constituent_of(a, inner));
    }

    #[test]
    fn state_refined_only_to_null_substates_is_effectively_null() {
        let mut t = ItemTable::new();
        let s = state(&mut t, "S");
        let e = state(&mut t, "E");
        t.set_refinement(s, Refinement::NonNull(vec![e])).unwrap();
        t.set_refinement(e, Refinement::Null).unwrap();
        assert!(t.has_null_refinement(s));
        assert!(!t.has_non_null_refinement(s));
    }

    #[test]
    fn external_without_properties_enables_all() {
        let props = ExternalProps::from_properties(&[]);
        assert_eq!(props.enabled().count(), 4);
        let only = ExternalProps::from_properties(&[ExternalProperty::AsyncReaders]);
        assert_eq!(
            only.enabled().collect::<Vec<_>>(),
            vec![ExternalProperty::AsyncReaders]
        );
    }

    #[test]
    fn external_property_parses_both_spellings() {
        use std::str::FromStr;
        assert_eq!(
            ExternalProperty::from_str("Effective_Reads").unwrap(),
            ExternalProperty::EffectiveReads
        );
        assert_eq!(
            ExternalProperty::from_str("async_writers").unwrap(),
            ExternalProperty::AsyncWriters
        );
        assert_eq!(ExternalProperty::AsyncReaders.to_string(), "Async_Readers");
    }
}
