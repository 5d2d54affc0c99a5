//! Resolved contract relations, as consumed by the normalizer and classifier.

use flowref_core::{Item, Span};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Access mode of a global item.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
pub enum GlobalMode {
    Input,
    Output,
    #[strum(to_string = "In_Out")]
    InOut,
    #[strum(to_string = "Proof_In")]
    ProofIn,
}

impl GlobalMode {
    pub const ALL: [GlobalMode; 4] = [
        GlobalMode::Input,
        GlobalMode::Output,
        GlobalMode::InOut,
        GlobalMode::ProofIn,
    ];

    pub fn index(self) -> usize {
        match self {
            GlobalMode::Input => 0,
            GlobalMode::Output => 1,
            GlobalMode::InOut => 2,
            GlobalMode::ProofIn => 3,
        }
    }
}

/// Which annotation a relation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ContractKind {
    Depends,
    Global,
    #[strum(to_string = "Refined_Depends")]
    RefinedDepends,
    #[strum(to_string = "Refined_Global")]
    RefinedGlobal,
    #[strum(to_string = "Refined_State")]
    RefinedState,
}

impl ContractKind {
    /// The specification-level contract a refinement decomposes.
    pub fn abstract_counterpart(self) -> Option<ContractKind> {
        match self {
            ContractKind::RefinedDepends => Some(ContractKind::Depends),
            ContractKind::RefinedGlobal => Some(ContractKind::Global),
            _ => None,
        }
    }
}

/// Operand tree of a resolved contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractExpr {
    Null(Span),
    Single(Item, Span),
    Aggregate(Vec<ContractExpr>, Span),
}

impl ContractExpr {
    pub fn span(&self) -> Span {
        match self {
            ContractExpr::Null(s) | ContractExpr::Single(_, s) | ContractExpr::Aggregate(_, s) => {
                *s
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ContractExpr::Null(_) | ContractExpr::Single(Item::Null, _))
    }

    /// Every item mentioned by this operand, in textual order.
    pub fn mentions(&self, out: &mut Vec<(Item, Span)>) {
        match self {
            ContractExpr::Null(_) => {}
            ContractExpr::Single(item, span) => out.push((*item, *span)),
            ContractExpr::Aggregate(elems, _) => {
                for e in elems {
                    e.mentions(out);
                }
            }
        }
    }
}

/// One `Outputs => [+] Inputs` association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClause {
    pub outputs: ContractExpr,
    pub inputs: ContractExpr,
    pub self_dependent: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDependency {
    Null(Span),
    Clauses(Vec<RawClause>, Span),
}

impl RawDependency {
    pub fn span(&self) -> Span {
        match self {
            RawDependency::Null(s) | RawDependency::Clauses(_, s) => *s,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawDependency::Null(_))
    }

    pub fn mentions(&self) -> Vec<(Item, Span)> {
        let mut out = Vec::new();
        if let RawDependency::Clauses(clauses, _) = self {
            for c in clauses {
                c.outputs.mentions(&mut out);
                c.inputs.mentions(&mut out);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawGlobal {
    Null(Span),
    /// Unmoded item list; classified under the default mode.
    Items(ContractExpr),
    Moded(Vec<ModedList>, Span),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModedList {
    pub mode: GlobalMode,
    pub mode_span: Span,
    pub items: RawGlobal,
}

impl RawGlobal {
    pub fn span(&self) -> Span {
        match self {
            RawGlobal::Null(s) | RawGlobal::Moded(_, s) => *s,
            RawGlobal::Items(e) => e.span(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawGlobal::Null(_))
    }

    pub fn mentions(&self) -> Vec<(Item, Span)> {
        let mut out = Vec::new();
        self.collect_mentions(&mut out);
        out
    }

    fn collect_mentions(&self, out: &mut Vec<(Item, Span)>) {
        match self {
            RawGlobal::Null(_) => {}
            RawGlobal::Items(e) => e.mentions(out),
            RawGlobal::Moded(lists, _) => {
                for l in lists {
                    l.items.collect_mentions(out);
                }
            }
        }
    }
}

/// `State => Constituents` after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRefinementClause {
    pub state: ContractExpr,
    pub constituents: ContractExpr,
    pub span: Span,
}
