//! Templates - declarative descriptions of the members a container expects.
//!
//! A template names a container and lists the symbols it should hold. Nested
//! containers (the subsystems of an agent) carry templates of their own.
//! Templates can be written in TOML:
//!
//! ```toml
//! symbol = { kind = "agent", key = "alice" }
//! members = [{ kind = "buffer", key = "stimulus" }]
//!
//! [[containers]]
//! symbol = { kind = "subsystem", key = "nacs" }
//! members = [
//!     { kind = "chunk", key = "APPLE" },
//!     { kind = "feature", key = { dim = "color", value = "red" } },
//!     { kind = { flow = "top_down" }, key = "td" },
//!     { kind = "response", key = "main" },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::ModelError;
use crate::symbols::{ConstructKind, ConstructSymbol};

/// Expected structure of one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// The container itself.
    pub symbol: ConstructSymbol,

    /// Basic constructs the container should hold.
    #[serde(default)]
    pub members: Vec<ConstructSymbol>,

    /// Nested containers, each with its own expectations.
    #[serde(default)]
    pub containers: Vec<Template>,
}

impl Template {
    /// Create an empty template for the given container.
    pub fn new(symbol: ConstructSymbol) -> Self {
        Self {
            symbol,
            members: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Add an expected member.
    pub fn with_member(mut self, member: ConstructSymbol) -> Self {
        self.members.push(member);
        self
    }

    /// Add several expected members.
    pub fn with_members(mut self, members: impl IntoIterator<Item = ConstructSymbol>) -> Self {
        self.members.extend(members);
        self
    }

    /// Add a nested container template.
    pub fn with_container(mut self, container: Template) -> Self {
        self.containers.push(container);
        self
    }

    /// Parse and validate a template from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, ModelError> {
        let template: Template = toml::from_str(source)?;
        template.validate()?;
        Ok(template)
    }

    /// Read, parse and validate a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check that every declared member may live in this container, that no
    /// symbol is declared twice, and that nested templates are valid too.
    pub fn validate(&self) -> Result<(), ModelError> {
        let kind = self.symbol.kind();
        if !kind.is_container() {
            return Err(ModelError::NotAContainer(self.symbol.clone()));
        }

        let mut seen = BTreeSet::new();
        for member in self.expected() {
            if !kind.may_contain(member.kind()) {
                return Err(ModelError::UnexpectedMember {
                    container: self.symbol.clone(),
                    member: member.clone(),
                });
            }
            if !seen.insert(member) {
                return Err(ModelError::DuplicateMember {
                    container: self.symbol.clone(),
                    member: member.clone(),
                });
            }
        }

        for container in &self.containers {
            container.validate()?;
        }
        Ok(())
    }

    /// Every symbol this container should directly hold: basic members first,
    /// then nested containers.
    pub fn expected(&self) -> impl Iterator<Item = &ConstructSymbol> {
        self.members
            .iter()
            .chain(self.containers.iter().map(|container| &container.symbol))
    }

    /// Expected direct members grouped by kind.
    pub fn by_kind(&self) -> BTreeMap<ConstructKind, Vec<&ConstructSymbol>> {
        let mut grouped: BTreeMap<ConstructKind, Vec<&ConstructSymbol>> = BTreeMap::new();
        for symbol in self.expected() {
            grouped.entry(symbol.kind()).or_default().push(symbol);
        }
        grouped
    }

    /// Nested template for the given container symbol.
    pub fn container(&self, symbol: &ConstructSymbol) -> Option<&Template> {
        self.containers.iter().find(|container| &container.symbol == symbol)
    }
}
