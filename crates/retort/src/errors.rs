use miette::Diagnostic;
use molgraph::MolGraphError;
use thiserror::Error;

pub type Result<T, E = RetortError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum RetortError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    MolGraph {
        #[from]
        error: MolGraphError,
    },

    #[error("a reaction needs at least one {side} template")]
    EmptyTemplates { side: &'static str },

    #[error("malformed reaction SMARTS {text:?}: expected reactants>agents>products")]
    MalformedReactionSmarts { text: String },

    #[error("atom map number {map_num} appears on more than one atom of the {side} templates")]
    DuplicateMapNumber { map_num: u32, side: &'static str },

    #[error("expected {required} reactants, but {provided} were provided")]
    ReactantCount { required: usize, provided: usize },

    #[error("the provided reactants are incompatible with the reaction's templates")]
    ReactantMismatch,

    #[error("malformed reaction file at line {line}: {reason}")]
    ReactionFile { line: usize, reason: String },

    #[error("the fragmentation strategy {name:?} is not registered")]
    StrategyLookup { name: String },
}

impl RetortError {
    pub(crate) fn malformed_reaction_smarts(text: &str) -> Self {
        let text = text.to_owned();

        Self::MalformedReactionSmarts { text }
    }

    pub(crate) fn reaction_file(line: usize, reason: impl ToString) -> Self {
        let reason = reason.to_string();

        Self::ReactionFile { line, reason }
    }

    pub(crate) fn strategy_lookup(name: &str) -> Self {
        let name = name.to_owned();

        Self::StrategyLookup { name }
    }
}
