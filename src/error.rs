use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Grammar(#[from] GrammarError),
}

/// Fatal problems found while compiling a grammar. There is no partial grammar: any of
/// these aborts compilation.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum GrammarError {
    #[error("Cyclic extends chain: {chain}")]
    #[diagnostic(
        code(grammar::cyclic_extends),
        help("A definition cannot extend itself, directly or through its ancestors.")
    )]
    CyclicExtends {
        chain: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("this definition is part of the cycle")]
        span: SourceSpan,
    },

    #[error("\"{id}\" extends undefined \"{parent}\"")]
    #[diagnostic(
        code(grammar::undefined_parent),
        help("Define \"{parent}\" or fix the extends reference.")
    )]
    UndefinedParent {
        id: String,
        parent: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("extends an unknown definition")]
        span: SourceSpan,
    },

    #[error("No cellType \"{cell_type}\" found (referenced by \"{referenced_by}\")")]
    #[diagnostic(
        code(grammar::undefined_cell_type),
        help("Declare a cell type named \"{cell_type}\" or use a prelude cell type.")
    )]
    UndefinedCellType {
        cell_type: String,
        referenced_by: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown cell type referenced here")]
        span: SourceSpan,
    },

    #[error("No parser \"{parser}\" found (referenced by \"{referenced_by}\")")]
    #[diagnostic(code(grammar::undefined_parser))]
    UndefinedParser {
        parser: String,
        referenced_by: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown parser referenced here")]
        span: SourceSpan,
    },

    #[error("Invalid regex \"{pattern}\": {reason}")]
    #[diagnostic(code(grammar::invalid_regex))]
    InvalidRegex {
        pattern: String,
        reason: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("this pattern does not compile")]
        span: SourceSpan,
    },

    #[error("Invalid number \"{value}\" for {directive}")]
    #[diagnostic(code(grammar::invalid_number))]
    InvalidNumber {
        directive: String,
        value: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("expected a number")]
        span: SourceSpan,
    },

    #[error("Unknown cell parser \"{value}\"")]
    #[diagnostic(
        code(grammar::invalid_cell_parser),
        help("Use one of: prefix, postfix, omnifix.")
    )]
    InvalidCellParser {
        value: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown alignment strategy")]
        span: SourceSpan,
    },

    #[error("Dispatch key \"{key}\" is claimed by both \"{first}\" and \"{second}\"")]
    #[diagnostic(
        code(grammar::ambiguous_dispatch),
        help("Give one of the definitions a different crux, or compile with CollisionPolicy::LastWriteWins.")
    )]
    AmbiguousDispatch {
        key: String,
        first: String,
        second: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("second claim on the key")]
        span: SourceSpan,
    },
}
