pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
mod resolver;
pub mod utils;
pub mod api;
pub mod cell_type;
pub mod cells;
pub mod definition;
pub mod grammar;
pub mod document;
pub mod diagnostic;
pub mod compiler;
pub mod serialization;
pub mod autocomplete;
pub mod synth;

pub use api::{compile_grammar, compile_grammar_with_options, parse, synthesize};
pub use diagnostic::{ErrorKind, ErrorRecord, Fix};
pub use document::{Document, DocumentNode, NodeId};
pub use error::{Error, GrammarError};
pub use grammar::{CollisionPolicy, Grammar, GrammarOptions};
pub use serialization::Value;
