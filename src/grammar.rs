use crate::cell_type::CellTypeDefinition;
use crate::definition::{DispatchTable, ParserDefinition};
use crate::diagnostic::ErrorRecord;
use crate::document::Document;
use log::{debug, trace, warn};
use std::collections::{BTreeMap, HashMap};

/// What happens when two definitions in one scope claim the same literal dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// The later definition takes the key. Each collision is logged as a warning.
    #[default]
    LastWriteWins,
    /// Grammar compilation fails with `GrammarError::AmbiguousDispatch`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarOptions {
    /// Source name shown in diagnostics.
    pub name: String,
    pub collision_policy: CollisionPolicy,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        Self {
            name: "grammar.parsers".to_string(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// Two definitions claiming one literal key while building a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Collision {
    pub key: String,
    pub first: usize,
    pub second: usize,
}

/// A compiled grammar: every cell type and parser definition with inheritance resolved.
/// Immutable once built, except for the lazily filled dispatch tables.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) name: String,
    pub(crate) cell_types: Vec<CellTypeDefinition>,
    pub(crate) cell_type_ids: HashMap<String, usize>,
    pub(crate) parsers: Vec<ParserDefinition>,
    pub(crate) parser_ids: HashMap<String, usize>,
    pub(crate) root: usize,
    pub(crate) blob: usize,
    pub(crate) unknown: usize,
    pub(crate) collision_policy: CollisionPolicy,
}

impl Grammar {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision_policy
    }

    pub fn cell_type(&self, id: &str) -> Option<&CellTypeDefinition> {
        self.cell_type_ids.get(id).map(|&i| &self.cell_types[i])
    }

    pub fn cell_type_at(&self, index: usize) -> &CellTypeDefinition {
        &self.cell_types[index]
    }

    pub fn cell_types(&self) -> &[CellTypeDefinition] {
        &self.cell_types
    }

    /// Looks a parser up by id. Top-level definitions shadow nested ones.
    pub fn parser(&self, id: &str) -> Option<&ParserDefinition> {
        self.parser_ids.get(id).map(|&i| &self.parsers[i])
    }

    pub fn parser_at(&self, index: usize) -> &ParserDefinition {
        &self.parsers[index]
    }

    /// Every parser definition, concrete and abstract, nested and built-in.
    pub fn parsers(&self) -> &[ParserDefinition] {
        &self.parsers
    }

    pub fn concrete_parsers(&self) -> impl Iterator<Item = &ParserDefinition> {
        self.parsers.iter().filter(|p| !p.is_abstract)
    }

    pub fn root_definition(&self) -> &ParserDefinition {
        &self.parsers[self.root]
    }

    /// Whether the root has a literal dispatch key, an empty `inScope` and no catch-all.
    pub fn is_self_dispatching_root(&self) -> bool {
        let root = &self.parsers[self.root];
        let enum_keyed = root
            .cell_type_indices
            .first()
            .is_some_and(|&c| self.cell_types[c].enum_options.is_some());
        !root.is_abstract
            && root.in_scope.is_empty()
            && root.catch_all_parser.is_none()
            && root.pattern.is_none()
            && (root.crux_if_any().is_some() || enum_keyed)
    }

    /// The dispatch table for children of `scope`, built on first use.
    pub fn dispatch_table(&self, scope: usize) -> &DispatchTable {
        self.parsers[scope].dispatch.get_or_init(|| {
            let (table, collisions) = self.build_dispatch_table(scope);
            for collision in collisions {
                warn!(
                    "Dispatch key \"{}\" in {} claimed by {} and {}; using {}",
                    collision.key,
                    self.parsers[scope].id,
                    self.parsers[collision.first].id,
                    self.parsers[collision.second].id,
                    self.parsers[collision.second].id
                );
            }
            table
        })
    }

    pub(crate) fn build_dispatch_table(&self, scope: usize) -> (DispatchTable, Vec<Collision>) {
        let def = &self.parsers[scope];
        let mut candidates: Vec<usize> = def.scope.values().copied().collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|&i| {
            let candidate = &self.parsers[i];
            !candidate.is_abstract && candidate.ancestors.iter().any(|a| def.in_scope.contains(a))
        });
        // A keyed root with nothing in scope describes the top-level lines itself.
        if scope == self.root && self.is_self_dispatching_root() {
            candidates = vec![scope];
        }

        let mut table = DispatchTable {
            catch_all: def.catch_all_parser,
            ..DispatchTable::default()
        };
        let mut collisions = Vec::new();
        for &index in &candidates {
            let candidate = &self.parsers[index];
            if let Some(pattern) = &candidate.pattern {
                table.patterns.push((pattern.clone(), index));
                continue;
            }
            let keys: Vec<String> = match candidate.crux_if_any() {
                Some(crux) => vec![crux.to_string()],
                None => candidate
                    .cell_type_indices
                    .first()
                    .and_then(|&c| self.cell_types[c].enum_options.clone())
                    .unwrap_or_default(),
            };
            for key in keys {
                if let Some(previous) = table.literals.insert(key.clone(), index) {
                    if previous != index {
                        collisions.push(Collision {
                            key,
                            first: previous,
                            second: index,
                        });
                    }
                }
            }
        }
        table.required = candidates
            .iter()
            .copied()
            .filter(|&i| self.parsers[i].required)
            .collect();
        table.candidates = candidates;
        debug!(
            "Dispatch table for {}: {} keys, {} patterns",
            def.id,
            table.literals.len(),
            table.patterns.len()
        );
        (table, collisions)
    }

    /// Chooses the definition for a line whose parent is bound to `scope`.
    pub fn bind(&self, scope: usize, line: &str) -> usize {
        let parent = &self.parsers[scope];
        if parent.is_blob() {
            return self.blob;
        }
        let table = self.dispatch_table(scope);
        let bound = table
            .lookup(line)
            .or(table.catch_all)
            .unwrap_or(self.unknown);
        trace!("Bound {line:?} under {} to {}", parent.id, self.parsers[bound].id);
        bound
    }

    /// The literal key a definition is dispatched on, or its id when it has none.
    pub fn dispatch_key(&self, index: usize) -> String {
        let def = &self.parsers[index];
        if let Some(crux) = def.crux_if_any() {
            return crux.to_string();
        }
        def.cell_type_indices
            .first()
            .and_then(|&c| self.cell_types[c].enum_options.as_ref())
            .and_then(|options| options.first().cloned())
            .unwrap_or_else(|| def.id.clone())
    }

    /// Parses `text` as a program of this grammar.
    pub fn parse(&self, text: &str) -> Document<'_> {
        Document::new(self, text)
    }

    /// Parses every `example` block and returns the errors found, keyed by definition id.
    /// Definitions whose examples are all clean are omitted.
    pub fn check_examples(&self) -> BTreeMap<String, Vec<ErrorRecord>> {
        let mut failures = BTreeMap::new();
        for def in &self.parsers {
            let errors: Vec<ErrorRecord> = def
                .examples
                .iter()
                .flat_map(|example| self.parse(example).errors())
                .collect();
            if !errors.is_empty() {
                failures.insert(def.id.clone(), errors);
            }
        }
        failures
    }

    /// The extends hierarchy as an indented tree of ids.
    pub fn parser_lineage(&self) -> String {
        let mut children: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        for def in &self.parsers {
            let parent = def.ancestor_indices.iter().rev().nth(1).copied();
            children.entry(parent).or_default().push(def.index);
        }
        let mut lines = Vec::new();
        self.write_lineage(None, 0, &children, &mut lines);
        lines.join("\n")
    }

    fn write_lineage(
        &self,
        parent: Option<usize>,
        depth: usize,
        children: &BTreeMap<Option<usize>, Vec<usize>>,
        lines: &mut Vec<String>,
    ) {
        for &index in children.get(&parent).map(Vec::as_slice).unwrap_or_default() {
            lines.push(format!("{}{}", " ".repeat(depth), self.parsers[index].id));
            self.write_lineage(Some(index), depth + 1, children, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{compile_grammar, compile_grammar_with_options};
    use crate::error::{Error, GrammarError};
    use crate::grammar::{CollisionPolicy, GrammarOptions};

    const COLORS: &str = "colorCell
 enum red green blue
keywordCell
rootParser
 root
 inScope abstractColorParser shapeParser
abstractColorParser
colorParser abstractColorParser
 cells colorCell
shapeParser
 crux shape
 cells keywordCell";

    #[test]
    fn test_enum_keys_and_crux() {
        let grammar = compile_grammar(COLORS).unwrap();
        let table = grammar.dispatch_table(grammar.root_definition().index);
        let keys: Vec<&str> = table.keys().collect();
        assert_eq!(keys, vec!["green", "blue", "red", "shape"]);
        assert_eq!(
            grammar.bind(grammar.root_definition().index, "red"),
            grammar.parser("colorParser").unwrap().index
        );
    }

    #[test]
    fn test_unmatched_line_binds_unknown() {
        let grammar = compile_grammar(COLORS).unwrap();
        let bound = grammar.bind(grammar.root_definition().index, "circle");
        assert!(grammar.parser_at(bound).is_error());
    }

    #[test]
    fn test_collision_last_write_wins() {
        let source = "rootParser\n root\n inScope aParser bParser\naParser\n crux x\nbParser\n crux x";
        let grammar = compile_grammar(source).unwrap();
        let root = grammar.root_definition().index;
        assert_eq!(grammar.bind(root, "x"), grammar.parser("bParser").unwrap().index);
    }

    #[test]
    fn test_collision_rejected() {
        let source = "rootParser\n root\n inScope aParser bParser\naParser\n crux x\nbParser\n crux x";
        let options = GrammarOptions {
            collision_policy: CollisionPolicy::Reject,
            ..GrammarOptions::default()
        };
        let err = compile_grammar_with_options(source, options).unwrap_err();
        assert!(matches!(
            err,
            Error::Grammar(GrammarError::AmbiguousDispatch { ref key, .. }) if key == "x"
        ));
    }

    #[test]
    fn test_parser_lineage() {
        let grammar = compile_grammar(COLORS).unwrap();
        let lineage = grammar.parser_lineage();
        assert!(lineage.contains("abstractColorParser\n colorParser"));
    }

    #[test]
    fn test_default_root_accepts_anything() {
        let grammar = compile_grammar("fooParser\n crux foo").unwrap();
        assert_eq!(grammar.root_definition().id, "DefaultRootParser");
        assert!(grammar.parse("anything at all\n nested too").errors().is_empty());
    }
}
