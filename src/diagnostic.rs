use crate::cells::{Cell, CellTypeRef};
use crate::document::{Document, DocumentNode, NodeId};
use crate::synth::{synthesize_line, synthesize_line_with};
use crate::utils::{did_you_mean, list_to_english_text};
use log::trace;
use serde::{Serialize, Serializer};
use std::fmt::Display;

/// Seed used for the lines inserted by missing-required-parser fixes.
const FIX_SEED: u64 = 0;

/// The closed set of problems a parsed document can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownParser,
    BlankLine,
    MissingRequiredParser,
    ParserUsedMultipleTimes,
    DuplicateLine,
    UnknownCellType,
    InvalidWord,
    ExtraWord,
    MissingWord,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownParser => "UnknownParserError",
            ErrorKind::BlankLine => "BlankLineError",
            ErrorKind::MissingRequiredParser => "MissingRequiredParserError",
            ErrorKind::ParserUsedMultipleTimes => "ParserUsedMultipleTimesError",
            ErrorKind::DuplicateLine => "DuplicateLineError",
            ErrorKind::UnknownCellType => "UnknownCellTypeError",
            ErrorKind::InvalidWord => "InvalidWordError",
            ErrorKind::ExtraWord => "ExtraWordError",
            ErrorKind::MissingWord => "MissingWordError",
        }
    }

    fn label(&self) -> &'static str {
        let name = self.as_str();
        name.strip_suffix("Error").unwrap_or(name)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A tree edit that corrects one error. Each fix records the line it expects to find, so
/// applying it a second time does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    ReplaceWord {
        node: NodeId,
        expected_line: String,
        cell_index: usize,
        replacement: String,
    },
    DeleteLine {
        node: NodeId,
        expected_line: String,
    },
    DeleteWord {
        node: NodeId,
        expected_line: String,
        cell_index: usize,
    },
    InsertChild {
        parent: NodeId,
        required: usize,
        line: String,
    },
}

/// One problem found in a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// 1-based line; 0 for problems of the document as a whole.
    pub line: usize,
    pub cell_index: usize,
    pub suggestion: Option<String>,
    /// First words from the top level down to the offending line.
    pub path: String,
    pub message: String,
    #[serde(skip)]
    pub node: NodeId,
    #[serde(skip)]
    pub fix: Option<Fix>,
}

struct ErrorCollector<'d, 'g> {
    doc: &'d Document<'g>,
    line: usize,
    errors: Vec<ErrorRecord>,
}

impl ErrorCollector<'_, '_> {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        kind: ErrorKind,
        node: &DocumentNode,
        line: usize,
        cell_index: usize,
        path: &str,
        detail: String,
        suggestion: Option<String>,
        fix: Option<Fix>,
    ) {
        self.errors.push(ErrorRecord {
            kind,
            line,
            cell_index,
            suggestion,
            path: path.to_string(),
            message: format!("{} at line {line} cell {cell_index}. {detail}", kind.label()),
            node: node.id(),
            fix,
        });
    }

    fn visit_children(&mut self, parent: &DocumentNode, parent_path: &str) {
        for (position, node) in parent.children().iter().enumerate() {
            self.line += 1;
            let line = self.line;
            let path = if parent_path.is_empty() {
                node.first_word().to_string()
            } else {
                format!("{parent_path} {}", node.first_word())
            };
            self.node_errors(node, parent, &parent.children()[..position], line, &path);
            self.required_errors(node, line, &path);
            self.visit_children(node, &path);
        }
    }

    fn node_errors(
        &mut self,
        node: &DocumentNode,
        parent: &DocumentNode,
        earlier: &[DocumentNode],
        line: usize,
        path: &str,
    ) {
        let grammar = self.doc.grammar();
        let def = self.doc.definition(node);
        if def.is_blob() {
            return;
        }
        if def.is_error() {
            self.unknown_parser(node, parent, line, path);
            return;
        }

        for cell in self.doc.cells(node).iter() {
            if !cell.is_valid(grammar, Some(self.doc)) {
                self.cell_error(node, cell, line, path);
            }
        }

        let delete = || {
            Some(Fix::DeleteLine {
                node: node.id(),
                expected_line: node.line().to_string(),
            })
        };
        if def.single && earlier.iter().any(|s| s.parser_index() == node.parser_index()) {
            self.push(
                ErrorKind::ParserUsedMultipleTimes,
                node,
                line,
                0,
                path,
                format!("Multiple \"{}\" found.", node.first_word()),
                None,
                delete(),
            );
        }
        if def.unique_line && earlier.iter().any(|s| s.line() == node.line()) {
            self.push(
                ErrorKind::DuplicateLine,
                node,
                line,
                0,
                path,
                format!("Duplicate line \"{}\".", node.line()),
                None,
                delete(),
            );
        }
    }

    fn unknown_parser(&mut self, node: &DocumentNode, parent: &DocumentNode, line: usize, path: &str) {
        if node.line().is_empty() {
            let fix = Fix::DeleteLine {
                node: node.id(),
                expected_line: String::new(),
            };
            self.push(
                ErrorKind::BlankLine,
                node,
                line,
                0,
                path,
                "Blank lines are errors.".to_string(),
                None,
                Some(fix),
            );
            return;
        }
        let table = self.doc.grammar().dispatch_table(parent.parser_index());
        let keys: Vec<&str> = table.keys().collect();
        let word = node.first_word();
        let suggestion = did_you_mean(word, keys.iter().copied());
        let mut detail = if keys.is_empty() {
            format!("Invalid parser \"{word}\". No parsers are allowed here.")
        } else {
            format!(
                "Invalid parser \"{word}\". Valid parsers are: {}.",
                list_to_english_text(&keys, 7)
            )
        };
        if let Some(s) = &suggestion {
            detail.push_str(&format!(" Did you mean \"{s}\"?"));
        }
        let fix = suggestion.as_ref().map(|replacement| Fix::ReplaceWord {
            node: node.id(),
            expected_line: node.line().to_string(),
            cell_index: 0,
            replacement: replacement.clone(),
        });
        self.push(ErrorKind::UnknownParser, node, line, 0, path, detail, suggestion, fix);
    }

    fn cell_error(&mut self, node: &DocumentNode, cell: &Cell, line: usize, path: &str) {
        let word = cell.word.as_deref().unwrap_or("");
        let def = self.doc.definition(node);
        let (kind, detail, suggestion, fix) = match cell.cell_type {
            CellTypeRef::ExtraWord => (
                ErrorKind::ExtraWord,
                format!("Extra word \"{word}\" in \"{}\".", def.id),
                None,
                Some(Fix::DeleteWord {
                    node: node.id(),
                    expected_line: node.line().to_string(),
                    cell_index: cell.index,
                }),
            ),
            CellTypeRef::Unknown => (
                ErrorKind::UnknownCellType,
                format!("No cell type in \"{}\" accepts \"{word}\".", def.id),
                None,
                None,
            ),
            CellTypeRef::Defined(_) if cell.is_missing() => (
                ErrorKind::MissingWord,
                format!("Missing \"{}\" cell.", cell.cell_type_id),
                None,
                None,
            ),
            CellTypeRef::Defined(_) => {
                let options = cell
                    .definition(self.doc.grammar())
                    .map(|d| d.autocomplete_options(Some(self.doc)))
                    .unwrap_or_default();
                let suggestion = did_you_mean(word, options.iter().map(String::as_str));
                let mut detail = format!("\"{word}\" does not fit in \"{}\" cell.", cell.cell_type_id);
                if let Some(s) = &suggestion {
                    detail.push_str(&format!(" Did you mean \"{s}\"?"));
                }
                let fix = suggestion.as_ref().map(|replacement| Fix::ReplaceWord {
                    node: node.id(),
                    expected_line: node.line().to_string(),
                    cell_index: cell.index,
                    replacement: replacement.clone(),
                });
                (ErrorKind::InvalidWord, detail, suggestion, fix)
            }
        };
        self.push(kind, node, line, cell.index, path, detail, suggestion, fix);
    }

    /// One error per required definition in the node's scope with no satisfying child.
    fn required_errors(&mut self, node: &DocumentNode, line: usize, path: &str) {
        let grammar = self.doc.grammar();
        let def = self.doc.definition(node);
        if def.is_blob() || def.is_error() {
            return;
        }
        let table = grammar.dispatch_table(node.parser_index());
        for &required in &table.required {
            let satisfied = node
                .children()
                .iter()
                .any(|c| grammar.parser_at(c.parser_index()).extends_or_is_index(required));
            if satisfied {
                continue;
            }
            let key = grammar.dispatch_key(required);
            let inserted = synthesize_line_with(grammar, required, FIX_SEED, self.doc)
                .unwrap_or_else(|| synthesize_line(grammar, required, FIX_SEED));
            self.push(
                ErrorKind::MissingRequiredParser,
                node,
                line,
                0,
                path,
                format!("Missing required parser \"{key}\"."),
                Some(inserted.clone()),
                Some(Fix::InsertChild {
                    parent: node.id(),
                    required,
                    line: inserted,
                }),
            );
        }
    }
}

impl Document<'_> {
    /// Every problem in the document, depth first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        let mut collector = ErrorCollector {
            doc: self,
            line: 0,
            errors: Vec::new(),
        };
        collector.required_errors(self.root(), 0, "");
        collector.visit_children(self.root(), "");
        collector.errors
    }

    pub fn errors_excluding(&self, kinds: &[ErrorKind]) -> Vec<ErrorRecord> {
        self.errors()
            .into_iter()
            .filter(|e| !kinds.contains(&e.kind))
            .collect()
    }

    /// Applies a fix. Returns `false` when the tree no longer looks the way the fix
    /// expects, which makes every fix idempotent.
    pub fn apply_fix(&mut self, fix: &Fix) -> bool {
        trace!("Applying {fix:?}");
        match fix {
            Fix::ReplaceWord {
                node,
                expected_line,
                cell_index,
                replacement,
            } => self.line_is(*node, expected_line) && self.set_word(*node, *cell_index, replacement),
            Fix::DeleteLine {
                node,
                expected_line,
            } => self.line_is(*node, expected_line) && self.delete_node(*node),
            Fix::DeleteWord {
                node,
                expected_line,
                cell_index,
            } => self.line_is(*node, expected_line) && self.delete_word(*node, *cell_index),
            Fix::InsertChild {
                parent,
                required,
                line,
            } => {
                let grammar = self.grammar();
                let already = match self.find(*parent) {
                    None => return false,
                    Some(p) => p.children().iter().any(|c| {
                        c.line() == line
                            || grammar.parser_at(c.parser_index()).extends_or_is_index(*required)
                    }),
                };
                !already && !self.append_text(*parent, line).is_empty()
            }
        }
    }

    fn line_is(&self, node: NodeId, expected: &str) -> bool {
        self.find(node).is_some_and(|n| n.line() == expected)
    }

    /// Applies every currently reported fix once. Returns how many changed the tree.
    pub fn auto_fix_all(&mut self) -> usize {
        let fixes: Vec<Fix> = self.errors().into_iter().filter_map(|e| e.fix).collect();
        fixes.iter().filter(|fix| self.apply_fix(fix)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::compile_grammar;

    const CALC: &str = "keywordCell
intCell
calcParser
 root
 inScope addParser
addParser
 crux add
 cells keywordCell intCell";

    #[test]
    fn test_message_shape() {
        let grammar = compile_grammar(CALC).unwrap();
        let errors = grammar.parse("add five").errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "InvalidWord at line 1 cell 1. \"five\" does not fit in \"intCell\" cell.");
        assert_eq!(errors[0].path, "add");
    }

    #[test]
    fn test_serialized_shape() {
        let grammar = compile_grammar(CALC).unwrap();
        let errors = grammar.parse("ad 5").errors();
        let json = serde_json::to_value(&errors[0]).unwrap();
        assert_eq!(json["kind"], "UnknownParserError");
        assert_eq!(json["cellIndex"], 0);
        assert_eq!(json["suggestion"], "add");
        assert_eq!(json["line"], 1);
        assert!(json.get("node").is_none());
    }

    #[test]
    fn test_replace_word_fix_is_idempotent() {
        let grammar = compile_grammar(CALC).unwrap();
        let mut doc = grammar.parse("ad 5");
        let fix = doc.errors()[0].fix.clone().unwrap();
        assert!(doc.apply_fix(&fix));
        assert_eq!(doc.to_string(), "add 5");
        assert!(doc.errors().is_empty());
        assert!(!doc.apply_fix(&fix));
        assert_eq!(doc.to_string(), "add 5");
    }

    #[test]
    fn test_blank_line_hidden_by_filter() {
        let grammar = compile_grammar(CALC).unwrap();
        let doc = grammar.parse("add 1\n\nadd 2");
        assert_eq!(doc.errors()[0].kind, ErrorKind::BlankLine);
        assert!(doc.errors_excluding(&[ErrorKind::BlankLine]).is_empty());
    }
}
