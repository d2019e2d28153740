use crate::ast::split_words;
use crate::cell_type::{CellTypeDefinition, PreludeKind, TypedWordSource};
use crate::definition::{CellParserKind, ParserDefinition};
use crate::grammar::Grammar;
use crate::serialization::Value;
use serde::Serialize;

/// What a cell was bound to by its alignment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTypeRef {
    Defined(usize),
    /// A word past the required cells of a definition with no catch-all type.
    ExtraWord,
    /// An omnifix word no remaining cell type accepts.
    Unknown,
}

pub const UNKNOWN_CELL_TYPE_ID: &str = "unknownCell";

/// One word of a line bound to a cell type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Word position in the line. Missing cells continue past the last word.
    pub index: usize,
    /// `None` when the line has fewer words than required cells.
    pub word: Option<String>,
    /// Character offset of the word within the line.
    pub start: usize,
    #[serde(skip)]
    pub cell_type: CellTypeRef,
    pub cell_type_id: String,
    pub is_catch_all: bool,
    pub value: Value,
}

impl Cell {
    fn bound(index: usize, word: Option<&str>, start: usize, def: &CellTypeDefinition, cell_type: usize, is_catch_all: bool) -> Self {
        Self {
            index,
            word: word.map(str::to_string),
            start,
            cell_type: CellTypeRef::Defined(cell_type),
            cell_type_id: def.id.clone(),
            is_catch_all,
            value: word.map_or(Value::Null, |w| def.parse(w)),
        }
    }

    fn placeholder(index: usize, word: &str, start: usize, cell_type: CellTypeRef) -> Self {
        let cell_type_id = match cell_type {
            CellTypeRef::ExtraWord => PreludeKind::ExtraWord.id(),
            _ => UNKNOWN_CELL_TYPE_ID,
        };
        Self {
            index,
            word: Some(word.to_string()),
            start,
            cell_type,
            cell_type_id: cell_type_id.to_string(),
            is_catch_all: false,
            value: Value::String(word.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.word.as_deref().map_or(true, str::is_empty)
    }

    /// Character offset one past the word.
    pub fn end(&self) -> usize {
        self.start + self.word.as_deref().map_or(0, |w| w.chars().count())
    }

    pub fn definition<'g>(&self, grammar: &'g Grammar) -> Option<&'g CellTypeDefinition> {
        match self.cell_type {
            CellTypeRef::Defined(index) => Some(grammar.cell_type_at(index)),
            _ => None,
        }
    }

    /// Full validity check. `words` supplies the document for dynamic enum validators.
    pub fn is_valid(&self, grammar: &Grammar, words: Option<&dyn TypedWordSource>) -> bool {
        match (self.definition(grammar), self.word.as_deref()) {
            (Some(def), Some(word)) if !word.is_empty() => def.is_valid(word, words),
            _ => false,
        }
    }
}

/// Binds the words of `line` to cells according to the definition's alignment strategy.
pub fn align(grammar: &Grammar, def: &ParserDefinition, line: &str) -> Vec<Cell> {
    let words = positioned_words(line);
    match def.cell_parser {
        CellParserKind::Prefix => align_positional(grammar, def, &words, false),
        CellParserKind::Postfix => align_positional(grammar, def, &words, true),
        CellParserKind::Omnifix => align_omnifix(grammar, def, &words),
    }
}

fn positioned_words(line: &str) -> Vec<(usize, &str)> {
    let mut start = 0;
    split_words(line)
        .into_iter()
        .map(|word| {
            let at = start;
            start += word.chars().count() + 1;
            (at, word)
        })
        .collect()
}

/// Prefix and postfix alignment. Postfix puts catch-all cells first and the required
/// cells on the trailing words.
fn align_positional(grammar: &Grammar, def: &ParserDefinition, words: &[(usize, &str)], postfix: bool) -> Vec<Cell> {
    let required = &def.cell_type_indices;
    let catch_all_count = if postfix {
        words.len().saturating_sub(required.len())
    } else {
        0
    };
    let total = words.len().max(required.len());
    let end_of_line = words.last().map_or(0, |(start, word)| start + word.chars().count());

    (0..total)
        .map(|index| {
            let (start, word) = match words.get(index) {
                Some((start, word)) => (*start, Some(*word)),
                None => (end_of_line, None),
            };
            let is_catch_all = if postfix {
                index < catch_all_count
            } else {
                index >= required.len()
            };
            let slot = if is_catch_all {
                def.catch_all_cell_index
            } else {
                required.get(index - catch_all_count).copied()
            };
            match slot {
                Some(cell_type) => Cell::bound(
                    index,
                    word,
                    start,
                    grammar.cell_type_at(cell_type),
                    cell_type,
                    is_catch_all,
                ),
                None => Cell::placeholder(index, word.unwrap_or(""), start, CellTypeRef::ExtraWord),
            }
        })
        .collect()
}

/// Order-independent alignment: each word takes the first remaining required type that
/// accepts it, then the catch-all type. Unconsumed required types become missing cells.
fn align_omnifix(grammar: &Grammar, def: &ParserDefinition, words: &[(usize, &str)]) -> Vec<Cell> {
    let mut pool: Vec<usize> = def.cell_type_indices.clone();
    let mut cells = Vec::with_capacity(words.len().max(pool.len()));

    for (index, (start, word)) in words.iter().enumerate() {
        let matched = pool
            .iter()
            .position(|&t| grammar.cell_type_at(t).is_valid(word, None));
        if let Some(position) = matched {
            let cell_type = pool.remove(position);
            cells.push(Cell::bound(index, Some(word), *start, grammar.cell_type_at(cell_type), cell_type, false));
            continue;
        }
        match def.catch_all_cell_index {
            Some(cell_type) if grammar.cell_type_at(cell_type).is_valid(word, None) => {
                cells.push(Cell::bound(index, Some(word), *start, grammar.cell_type_at(cell_type), cell_type, true));
            }
            _ => cells.push(Cell::placeholder(index, word, *start, CellTypeRef::Unknown)),
        }
    }

    let end_of_line = words.last().map_or(0, |(start, word)| start + word.chars().count());
    for (offset, cell_type) in pool.into_iter().enumerate() {
        cells.push(Cell::bound(
            words.len() + offset,
            None,
            end_of_line,
            grammar.cell_type_at(cell_type),
            cell_type,
            false,
        ));
    }
    cells
}
