use crate::document::Document;
use crate::error::Error;
use crate::grammar::{Grammar, GrammarOptions};
use crate::resolver;
use crate::synth;

/// Compiles a grammar with default options.
///
/// # Errors
/// Returns an `Error` if the grammar has a cyclic or undefined `extends`, references an
/// undefined cell type or parser, or contains an invalid regex or number.
pub fn compile_grammar(source: &str) -> Result<Grammar, Error> {
    compile_grammar_with_options(source, GrammarOptions::default())
}

/// Compiles a grammar. `options.name` is the source name shown in diagnostics.
///
/// # Errors
/// See [`compile_grammar`]. With [`crate::CollisionPolicy::Reject`], two definitions
/// claiming the same dispatch key in one scope are also an error.
pub fn compile_grammar_with_options(source: &str, options: GrammarOptions) -> Result<Grammar, Error> {
    Ok(resolver::compile(source, &options)?)
}

/// Parses `text` as a program of `grammar`. Never fails: problems are reported by
/// [`Document::errors`].
#[must_use]
pub fn parse<'g>(grammar: &'g Grammar, text: &str) -> Document<'g> {
    grammar.parse(text)
}

/// Generates `count` sample programs from `grammar`, deterministically for a given seed.
#[must_use]
pub fn synthesize(grammar: &Grammar, count: usize, seed: u64) -> Vec<String> {
    synth::synthesize(grammar, count, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorKind;
    use crate::serialization::Value;

    const CONFIG: &str = "// A tiny settings language
keywordCell
hostCell
 examples localhost
portCell
 extends intCell
 min 1
 max 65535
intCell
configParser
 root
 inScope hostParser portParser
hostParser
 crux host
 single
 cells keywordCell hostCell
portParser
 crux port
 single
 cells keywordCell portCell";

    #[test]
    fn test_compile_parse_and_query() {
        let grammar = compile_grammar(CONFIG).unwrap();
        let doc = parse(&grammar, "host example.com\nport 8080");
        assert!(doc.errors().is_empty());
        let value = doc.to_typed_value();
        assert_eq!(value.get("port"), Some(&Value::Int(8080)));
        assert_eq!(value.get("host"), Some(&Value::String("example.com".into())));
        assert_eq!(doc.to_string(), "host example.com\nport 8080");
    }

    #[test]
    fn test_invalid_word_is_reported() {
        let grammar = compile_grammar(CONFIG).unwrap();
        let doc = parse(&grammar, "port http");
        let errors = doc.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InvalidWord);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].cell_index, 1);
    }

    #[test]
    fn test_synthesized_programs_are_valid() {
        let grammar = compile_grammar(CONFIG).unwrap();
        for program in synthesize(&grammar, 5, 42) {
            assert!(parse(&grammar, &program).errors().is_empty(), "{program}");
        }
    }
}
