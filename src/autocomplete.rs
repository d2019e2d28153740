use crate::document::{Document, DocumentNode};
use serde::Serialize;

/// Suggestions for the word under a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteResult {
    pub start_char: usize,
    pub end_char: usize,
    pub word: String,
    pub matches: Vec<String>,
}

impl Document<'_> {
    /// Completions at a 0-based line and character position of the document text.
    ///
    /// The first word of a line completes to the dispatch keys of its parent's scope. A
    /// cursor inside the indentation moves one scope further out per missing space. Later
    /// words complete to the enum options of their cell type. A line past the end of the
    /// document completes against the root scope.
    pub fn autocomplete_at(&self, line_index: usize, char_index: usize) -> AutocompleteResult {
        let Some((path, depth)) = self.path_to_line(line_index + 1) else {
            return AutocompleteResult {
                start_char: char_index,
                end_char: char_index,
                word: String::new(),
                matches: self.scope_keys(self.root(), ""),
            };
        };

        let node = path[path.len() - 1];
        let raw: Vec<char> = " ".repeat(depth).chars().chain(node.line().chars()).collect();
        let cursor = char_index.min(raw.len());
        let start_char = raw[..cursor]
            .iter()
            .rposition(|&c| c == ' ')
            .map_or(0, |i| i + 1);
        let end_char = raw[cursor..]
            .iter()
            .position(|&c| c == ' ')
            .map_or(raw.len(), |i| cursor + i);
        let word: String = raw[start_char..end_char].iter().collect();
        let word_index = raw[..cursor].iter().filter(|&&c| c == ' ').count() as isize - depth as isize;

        let matches = if word_index > 0 {
            self.cells(node)
                .get(word_index as usize)
                .and_then(|cell| cell.definition(self.grammar()))
                .map(|cell_type| {
                    cell_type
                        .autocomplete_options(Some(self))
                        .into_iter()
                        .filter(|option| option.contains(word.as_str()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        } else {
            // `path` holds the root followed by every node down to this line.
            let levels_up = (1 - word_index) as usize;
            let scope = path
                .len()
                .checked_sub(1 + levels_up)
                .map_or(self.root(), |i| path[i]);
            self.scope_keys(scope, &word)
        };

        AutocompleteResult {
            start_char,
            end_char,
            word,
            matches,
        }
    }

    fn scope_keys(&self, scope: &DocumentNode, word: &str) -> Vec<String> {
        self.grammar()
            .dispatch_table(scope.parser_index())
            .keys()
            .filter(|key| key.contains(word))
            .map(str::to_string)
            .collect()
    }

    /// Root-first chain of nodes ending at the 1-based `line_number`, with that line's depth.
    fn path_to_line(&self, line_number: usize) -> Option<(Vec<&DocumentNode>, usize)> {
        let mut stack = vec![self.root()];
        for entry in self.walk() {
            stack.truncate(entry.depth + 1);
            stack.push(entry.node);
            if entry.line_number == line_number {
                return Some((stack, entry.depth));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::api::compile_grammar;

    const GRAMMAR: &str = "keywordCell
colorCell
 enum red green blue
rootParser
 root
 inScope paintParser groupParser
paintParser
 crux paint
 cells keywordCell colorCell
groupParser
 crux group
 cells keywordCell
 inScope paintParser";

    #[test]
    fn test_first_word_completes_scope_keys() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("paint red\ngr");
        let result = doc.autocomplete_at(1, 2);
        assert_eq!(result.word, "gr");
        assert_eq!((result.start_char, result.end_char), (0, 2));
        assert_eq!(result.matches, vec!["group"]);
    }

    #[test]
    fn test_cell_completes_enum_options() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("paint re");
        let result = doc.autocomplete_at(0, 8);
        assert_eq!(result.word, "re");
        assert_eq!(result.start_char, 6);
        assert_eq!(result.matches, vec!["green", "red"]);
    }

    #[test]
    fn test_nested_and_indentation_scopes() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("group\n pa");
        assert_eq!(doc.autocomplete_at(1, 3).matches, vec!["paint"]);
        // Inside the indentation the root scope applies.
        assert_eq!(doc.autocomplete_at(1, 0).matches, vec!["paint", "group"]);
    }

    #[test]
    fn test_past_the_end_uses_root_scope() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("paint red");
        let result = doc.autocomplete_at(5, 0);
        assert_eq!(result.word, "");
        assert_eq!(result.matches, vec!["paint", "group"]);
    }
}
