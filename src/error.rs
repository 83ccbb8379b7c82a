use thiserror::Error;

/// Fatal rendering errors. A render call either returns the complete
/// output or one of these; partial output is never handed back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A `for` loop's iterable is missing or is not a sequence.
    #[error("`{name}` is not iterable: expected an array, found {found}")]
    IterableType {
        /// Identifier named after `in`
        name: String,
        /// Type of the resolved value, or `nothing` when unbound
        found: &'static str,
    },

    /// An `if` condition could not be lexed, parsed, or evaluated.
    #[error("invalid condition `{expr}`: {reason}")]
    Expression {
        /// Condition text as written in the template
        expr: String,
        /// What went wrong
        reason: String,
    },

    /// A close tag without an open tag, or an open tag that is never closed.
    #[error("unmatched tag `{tag}` at byte {offset}")]
    UnmatchedTag {
        /// Raw tag text
        tag: String,
        /// Byte offset of the tag in the template
        offset: usize,
    },

    /// Block nesting exceeds `RenderOptions::max_depth`.
    #[error("blocks nest deeper than the configured limit of {limit}")]
    NestingTooDeep { limit: usize },
}
