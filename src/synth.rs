//! Deterministic generation of sample programs from a grammar.
//!
//! Every line is drawn from its own `ChaCha8Rng`, seeded with the caller's seed and
//! placed on a stream derived from the definition id, so the output depends only on the
//! grammar and the seed.

use crate::cell_type::{CellTypeDefinition, PreludeKind, TypedWordSource};
use crate::cells::align;
use crate::definition::{ParserDefinition, DO_NOT_SYNTHESIZE_TAG};
use crate::grammar::Grammar;
use crate::utils::stable_hash;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Generates `count` programs. Program `i` uses `seed + i`.
pub fn synthesize(grammar: &Grammar, count: usize, seed: u64) -> Vec<String> {
    (0..count as u64)
        .map(|i| synthesize_program(grammar, seed.wrapping_add(i)))
        .collect()
}

pub fn synthesize_program(grammar: &Grammar, seed: u64) -> String {
    let root = grammar.root_definition().index;
    let mut program = Program {
        grammar,
        seed,
        lines: Vec::new(),
        emitted: Vec::new(),
    };
    program.children(root, 0, &mut Vec::new());
    program.lines.join("\n")
}

/// A program under construction, with every typed word written so far.
struct Program<'g> {
    grammar: &'g Grammar,
    seed: u64,
    lines: Vec<String>,
    emitted: Vec<(&'g CellTypeDefinition, String)>,
}

impl TypedWordSource for Program<'_> {
    fn words_typed_with(&self, cell_type_ids: &[String]) -> Rc<BTreeSet<String>> {
        let words = self
            .emitted
            .iter()
            .filter(|(def, _)| cell_type_ids.iter().any(|id| def.extends_or_is(id)))
            .map(|(_, word)| word.clone())
            .collect();
        Rc::new(words)
    }
}

impl<'g> Program<'g> {
    fn children(&mut self, scope: usize, depth: usize, chain: &mut Vec<usize>) {
        let grammar = self.grammar;
        if grammar.parser_at(scope).is_blob() {
            return;
        }
        let table = grammar.dispatch_table(scope);
        for &index in &table.candidates {
            let def = grammar.parser_at(index);
            if !should_synthesize(grammar, def, chain) {
                continue;
            }
            // Lines that cannot be written, would not bind back to their definition, or
            // would not validate against the words so far are left out with their subtree.
            let known: &dyn TypedWordSource = &*self;
            let Some(line) = line_for(grammar, index, self.seed, Some(known)) else {
                continue;
            };
            if line.is_empty() || grammar.bind(scope, &line) != index {
                continue;
            }
            let cells = align(grammar, def, &line);
            if !cells.iter().all(|c| c.is_valid(grammar, Some(known))) {
                continue;
            }
            for cell in cells.iter() {
                if let (Some(cell_type), Some(word)) = (cell.definition(grammar), &cell.word) {
                    self.emitted.push((cell_type, word.clone()));
                }
            }
            self.lines.push(format!("{}{line}", " ".repeat(depth)));
            chain.push(index);
            self.children(index, depth + 1, chain);
            chain.pop();
        }
    }
}

fn should_synthesize(grammar: &Grammar, def: &ParserDefinition, chain: &[usize]) -> bool {
    if def.is_error() || def.is_abstract || def.has_tag(DO_NOT_SYNTHESIZE_TAG) {
        return false;
    }
    if chain.contains(&def.index) {
        return false;
    }
    let enum_keyed = def
        .cell_type_indices
        .first()
        .is_some_and(|&c| grammar.cell_type_at(c).enum_options.is_some());
    def.pattern.is_some() || def.crux_if_any().is_some() || enum_keyed
}

/// One line for the definition at `index`: its crux, then a value for each remaining
/// required cell. Cells that reference other words get a placeholder.
pub fn synthesize_line(grammar: &Grammar, index: usize, seed: u64) -> String {
    line_for(grammar, index, seed, None).unwrap_or_default()
}

/// Like [`synthesize_line`], but cells that reference other words pick one of `words`.
/// `None` when such a cell has nothing to pick from.
pub fn synthesize_line_with(
    grammar: &Grammar,
    index: usize,
    seed: u64,
    words: &dyn TypedWordSource,
) -> Option<String> {
    line_for(grammar, index, seed, Some(words))
}

fn line_for(grammar: &Grammar, index: usize, seed: u64, words: Option<&dyn TypedWordSource>) -> Option<String> {
    let def = grammar.parser_at(index);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stable_hash(&def.id));
    let crux = def.crux_if_any();
    def.cell_type_indices
        .iter()
        .enumerate()
        .map(|(i, &cell_type)| match crux {
            Some(crux) if i == 0 => Some(crux.to_string()),
            _ => synthesize_word(grammar.cell_type_at(cell_type), def, words, &mut rng),
        })
        .collect::<Option<Vec<_>>>()
        .map(|words| words.join(" "))
}

fn synthesize_word(
    cell: &CellTypeDefinition,
    def: &ParserDefinition,
    words: Option<&dyn TypedWordSource>,
    rng: &mut ChaCha8Rng,
) -> Option<String> {
    if let Some(option) = cell.enum_options.as_ref().and_then(|o| o.choose(rng)) {
        return Some(option.clone());
    }
    if let (Some(ids), Some(source)) = (&cell.enum_from_cell_types, words) {
        let known = source.words_typed_with(ids);
        let known: Vec<&String> = known.iter().collect();
        return known.choose(rng).map(|word| word.to_string());
    }
    let word = match cell.prelude_kind {
        PreludeKind::Int => {
            let (a, b) = (cell.min_or_default().ceil() as i64, cell.max_or_default().floor() as i64);
            rng.gen_range(a.min(b)..=a.max(b)).to_string()
        }
        PreludeKind::Float => {
            let (a, b) = (cell.min_or_default(), cell.max_or_default());
            let value: f64 = rng.gen_range(a.min(b)..=a.max(b));
            format!("{value:.2}")
        }
        PreludeKind::Bit => ["0", "1"].choose(rng).copied().unwrap_or("0").to_string(),
        PreludeKind::Bool => {
            let choices: Vec<&str> = PreludeKind::bool_words().collect();
            choices.choose(rng).copied().unwrap_or("true").to_string()
        }
        PreludeKind::Keyword => def.crux_if_any().unwrap_or(def.id_stem()).to_string(),
        PreludeKind::Any | PreludeKind::ExtraWord => match cell.examples.choose(rng) {
            Some(example) => example.clone(),
            None => format!("{}-{}", def.id_stem(), cell.id),
        },
    };
    Some(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::compile_grammar;

    const GRAMMAR: &str = "keywordCell
intCell
 min 1
 max 9
colorCell
 enum red green
wordCell
 examples alpha beta
appParser
 root
 inScope settingParser loopParser
settingParser
 crux set
 cells keywordCell colorCell intCell wordCell
loopParser
 crux loop
 cells keywordCell
 inScope loopParser settingParser
hiddenParser settingParser
 crux hidden
 tags doNotSynthesize";

    #[test]
    fn test_same_seed_same_output() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        assert_eq!(synthesize(&grammar, 3, 7), synthesize(&grammar, 3, 7));
    }

    #[test]
    fn test_line_shape() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let setting = grammar.parser("settingParser").unwrap().index;
        let line = synthesize_line(&grammar, setting, 11);
        let words: Vec<&str> = line.split(' ').collect();
        assert_eq!(words[0], "set");
        assert!(["red", "green"].contains(&words[1]));
        let n: i64 = words[2].parse().unwrap();
        assert!((1..=9).contains(&n));
        assert!(["alpha", "beta"].contains(&words[3]));
    }

    #[test]
    fn test_recursion_is_cut_and_tags_respected() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let program = synthesize_program(&grammar, 1);
        assert!(program.contains("loop\n set"));
        assert!(!program.contains(" loop"));
        assert!(!program.contains("hidden"));
    }
}
