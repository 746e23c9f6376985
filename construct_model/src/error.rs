//! Errors raised while building or validating model descriptions.

use thiserror::Error;

use crate::symbols::ConstructSymbol;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to parse template: {0}")]
    TemplateParse(#[from] toml::de::Error),

    #[error("failed to read template: {0}")]
    Io(#[from] std::io::Error),

    #[error("{container} may not contain {member}")]
    UnexpectedMember {
        container: ConstructSymbol,
        member: ConstructSymbol,
    },

    #[error("{member} is declared more than once in {container}")]
    DuplicateMember {
        container: ConstructSymbol,
        member: ConstructSymbol,
    },

    #[error("{0} is not a container construct")]
    NotAContainer(ConstructSymbol),
}
