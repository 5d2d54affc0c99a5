//! Compilation-unit descriptions.
//!
//! A unit file declares the abstract states and objects of one package, its
//! `Refined_State` contract, and the flow contracts of its subprograms:
//!
//! ```toml
//! [package]
//! name = "Counters"
//! refined_state = "(State => (Count, Limit))"
//!
//! [[state]]
//! name = "State"
//!
//! [[object]]
//! name = "Count"
//!
//! [[subprogram]]
//! name = "Bump"
//! params = [{ name = "By", mode = "in" }]
//! global = "(In_Out => State)"
//! depends = "(State =>+ By)"
//! refined_global = "(In_Out => Count, Input => Limit)"
//! refined_depends = "(Count =>+ (By, Limit))"
//! ```

use crate::report::{SubjectReport, UnitReport};
use flowref_compiler::{check_package_text, check_subprogram_text, package_sheet, CheckOptions};
use flowref_core::{ExternalProperty, ExternalProps, ItemModelError, ItemTable, ObjectKind, ParamRole, Span};

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid unit description: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid declaration: {0}")]
    Model(#[from] ItemModelError),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Unit {
    #[serde(default)]
    pub package: PackageDecl,
    #[serde(default, rename = "state")]
    pub states: Vec<StateDecl>,
    #[serde(default, rename = "object")]
    pub objects: Vec<ObjectDecl>,
    #[serde(default, rename = "subprogram")]
    pub subprograms: Vec<SubprogramDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDecl {
    #[serde(default = "default_package_name")]
    pub name: String,
    pub refined_state: Option<String>,
}

impl Default for PackageDecl {
    fn default() -> Self {
        Self {
            name: default_package_name(),
            refined_state: None,
        }
    }
}

fn default_package_name() -> String {
    "Unit".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDecl {
    pub name: String,
    /// External properties; an empty list means all four
    pub external: Option<Vec<ExternalProperty>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDecl {
    pub name: String,
    #[serde(default = "default_object_kind")]
    pub kind: ObjectKind,
    /// Volatility properties; an empty list means all four
    pub volatile: Option<Vec<ExternalProperty>>,
}

fn default_object_kind() -> ObjectKind {
    ObjectKind::Variable
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubprogramKind {
    #[default]
    Procedure,
    Function,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default = "default_param_mode")]
    pub mode: ParamRole,
}

fn default_param_mode() -> ParamRole {
    ParamRole::In
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubprogramDecl {
    pub name: String,
    #[serde(default)]
    pub kind: SubprogramKind,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    pub depends: Option<String>,
    pub global: Option<String>,
    pub refined_depends: Option<String>,
    pub refined_global: Option<String>,
}

fn external(props: &Option<Vec<ExternalProperty>>) -> Option<ExternalProps> {
    props.as_deref().map(ExternalProps::from_properties)
}

impl Unit {
    pub fn parse(s: &str) -> Result<Self, UnitError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, UnitError> {
        let content = std::fs::read_to_string(path).map_err(|source| UnitError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Declare the states and objects of the unit in a fresh item table.
    pub fn declare(&self) -> Result<ItemTable, UnitError> {
        let mut items = ItemTable::new();
        for s in &self.states {
            items.declare_state(&s.name, external(&s.external), Span::dummy())?;
        }
        for o in &self.objects {
            items.declare_object(&o.name, o.kind, external(&o.volatile), Span::dummy())?;
        }
        debug!(
            states = self.states.len(),
            objects = self.objects.len(),
            "unit declared"
        );
        Ok(items)
    }

    /// Record the package refinement, then check every subprogram against it.
    pub fn check(&self, name: &str, options: CheckOptions) -> Result<UnitReport, UnitError> {
        let mut items = self.declare()?;
        let mut report = UnitReport::new(name);

        if let Some(text) = &self.package.refined_state {
            let sheet = package_sheet(text);
            let subject = format!("package {}", self.package.name);
            let result = check_package_text(&mut items, &self.package.name, text);
            report.push(SubjectReport::from_result(&subject, sheet.source(), name, result));
        }

        for sub in &self.subprograms {
            let params: Vec<_> = sub
                .params
                .iter()
                .map(|p| items.declare_parameter(&p.name, p.mode, Span::dummy()))
                .collect();
            let text = sub.to_text(params);
            let sheet = text.sheet();
            let result = check_subprogram_text(&items, &text, options);
            report.push(SubjectReport::from_result(&sub.name, sheet.source(), name, result));
        }

        info!(
            unit = name,
            subjects = report.subjects.len(),
            rejected = report.rejected(),
            "unit checked"
        );
        Ok(report)
    }
}

impl SubprogramDecl {
    fn to_text(&self, params: Vec<flowref_core::ItemId>) -> flowref_compiler::SubprogramText {
        flowref_compiler::SubprogramText {
            name: self.name.clone(),
            is_function: self.kind == SubprogramKind::Function,
            params,
            depends: self.depends.clone(),
            global: self.global.clone(),
            refined_depends: self.refined_depends.clone(),
            refined_global: self.refined_global.clone(),
        }
    }
}
