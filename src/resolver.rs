use crate::ast::Particle;
use crate::cell_type::{sort_longest_first, CellTypeDefinition, PreludeKind, Validator};
use crate::definition::{
    BaseParser, CellParserKind, CompilerSettings, ParserDefinition, BLOB_PARSER_ID,
    DEFAULT_ROOT_PARSER_ID, UNKNOWN_PARSER_ID,
};
use crate::error::GrammarError;
use crate::grammar::{CollisionPolicy, Grammar, GrammarOptions};
use crate::parser::parse_particles;
use crate::serialization::Value;
use log::{debug, warn};
use miette::{NamedSource, SourceSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

static CELL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+Cell$").expect("static cell id regex"));
static PARSER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+Parser$").expect("static parser id regex"));

const PARSER_DIRECTIVES: &[&str] = &[
    "extends", "root", "abstract", "inScope", "cells", "catchAllCellType", "cellParser",
    "catchAllParser", "crux", "cue", "cruxFromId", "pattern", "required", "single",
    "uniqueLine", "uniqueFirstWord", "listDelimiter", "contentKey", "childrenKey",
    "baseParser", "tags", "description", "example", "compiler", "boolean", "int", "float",
    "string", "popularity", "extensions", "compilesTo", "javascript", "//",
];

/// Directives as written on one definition, before inheritance is applied.
#[derive(Debug, Default)]
struct ParserDirectives {
    extends: Option<String>,
    cells: Option<Vec<String>>,
    catch_all_cell_type: Option<String>,
    cell_parser: Option<CellParserKind>,
    catch_all_parser: Option<String>,
    in_scope: Vec<String>,
    crux: Option<String>,
    pattern: Option<Regex>,
    crux_from_id: Option<bool>,
    required: Option<bool>,
    single: Option<bool>,
    unique_line: Option<bool>,
    unique_first_word: Option<bool>,
    is_abstract: bool,
    is_root: bool,
    base: Option<BaseParser>,
    list_delimiter: Option<String>,
    content_key: Option<String>,
    children_key: Option<String>,
    compiler: CompilerSettings,
    constants: BTreeMap<String, Value>,
    tags: Option<Vec<String>>,
    description: Option<String>,
    examples: Vec<String>,
}

#[derive(Debug, Default)]
struct CellDirectives {
    extends: Option<String>,
    regex: Option<Regex>,
    reserved_words: Option<HashSet<String>>,
    enum_options: Option<Vec<String>>,
    enum_from_cell_types: Option<Vec<String>>,
    min: Option<f64>,
    max: Option<f64>,
    examples: Option<Vec<String>>,
    description: Option<String>,
    paint: Option<String>,
}

struct RawCell<'a> {
    id: String,
    particle: Option<&'a Particle>,
    directives: CellDirectives,
}

struct RawParser<'a> {
    id: String,
    particle: Option<&'a Particle>,
    enclosing: Option<usize>,
    nested: Vec<usize>,
    directives: ParserDirectives,
}

/// Compiles grammar source into a [`Grammar`].
pub(crate) struct Resolver<'a> {
    source: &'a str,
    name: &'a str,
    cells: Vec<RawCell<'a>>,
    parsers: Vec<RawParser<'a>>,
}

pub(crate) fn compile(source: &str, options: &GrammarOptions) -> Result<Grammar, GrammarError> {
    let root = parse_particles(source);
    let mut resolver = Resolver::new(source, &options.name);
    resolver.collect(&root)?;
    let grammar = resolver.resolve(options.collision_policy)?;
    debug!(
        "Compiled grammar {}: {} cell types, {} parsers, root {}",
        options.name,
        grammar.cell_types().len(),
        grammar.parsers().len(),
        grammar.root_definition().id
    );
    Ok(grammar)
}

impl<'a> Resolver<'a> {
    fn new(source: &'a str, name: &'a str) -> Self {
        Self {
            source,
            name,
            cells: Vec::new(),
            parsers: Vec::new(),
        }
    }

    fn src(&self) -> NamedSource<String> {
        NamedSource::new(self.name, self.source.to_string())
    }

    fn span_of(particle: Option<&Particle>) -> SourceSpan {
        particle.map_or((0, 0).into(), Particle::get_source_span)
    }

    // 1. Gather definitions and their own directives.

    fn collect(&mut self, root: &'a Particle) -> Result<(), GrammarError> {
        for particle in &root.children {
            let first_word = particle.first_word();
            if first_word.is_empty() || first_word.starts_with("//") {
                continue;
            }
            if CELL_ID.is_match(first_word) {
                let directives = self.cell_directives(particle)?;
                self.cells.push(RawCell {
                    id: first_word.to_string(),
                    particle: Some(particle),
                    directives,
                });
            } else if PARSER_ID.is_match(first_word) {
                self.collect_parser(particle, None)?;
            } else {
                warn!(
                    "Skipping unrecognized grammar line {}: {}",
                    particle.line_number, particle.line
                );
            }
        }

        for (id, _) in PreludeKind::IDS {
            if !self.cells.iter().any(|c| c.id == id) {
                self.cells.push(RawCell {
                    id: id.to_string(),
                    particle: None,
                    directives: CellDirectives::default(),
                });
            }
        }

        self.add_builtin(BLOB_PARSER_ID, |d| d.base = Some(BaseParser::Blob));
        self.add_builtin(UNKNOWN_PARSER_ID, |d| d.base = Some(BaseParser::Error));
        if !self.parsers.iter().any(|p| p.directives.is_root) {
            self.add_builtin(DEFAULT_ROOT_PARSER_ID, |d| {
                d.is_root = true;
                d.catch_all_parser = Some(BLOB_PARSER_ID.to_string());
            });
        }
        Ok(())
    }

    fn add_builtin(&mut self, id: &str, configure: impl FnOnce(&mut ParserDirectives)) {
        if self.parsers.iter().any(|p| p.enclosing.is_none() && p.id == id) {
            return;
        }
        let mut directives = ParserDirectives::default();
        configure(&mut directives);
        self.parsers.push(RawParser {
            id: id.to_string(),
            particle: None,
            enclosing: None,
            nested: Vec::new(),
            directives,
        });
    }

    fn collect_parser(&mut self, particle: &'a Particle, enclosing: Option<usize>) -> Result<usize, GrammarError> {
        let index = self.parsers.len();
        let id = particle.first_word().to_string();
        let directives = self.parser_directives(&id, particle)?;
        self.parsers.push(RawParser {
            id,
            particle: Some(particle),
            enclosing,
            nested: Vec::new(),
            directives,
        });
        for child in &particle.children {
            let word = child.first_word();
            if !PARSER_DIRECTIVES.contains(&word) && PARSER_ID.is_match(word) {
                let nested = self.collect_parser(child, Some(index))?;
                self.parsers[index].nested.push(nested);
            }
        }
        Ok(index)
    }

    fn parser_directives(&self, id: &str, particle: &Particle) -> Result<ParserDirectives, GrammarError> {
        let mut d = ParserDirectives {
            extends: particle.words().get(1).map(|w| w.to_string()),
            is_abstract: id.starts_with("abstract"),
            ..ParserDirectives::default()
        };
        for child in &particle.children {
            let words = child.words();
            let Some(&keyword) = words.first() else {
                continue;
            };
            let rest = || child.content().unwrap_or("").to_string();
            let list = || words[1..].iter().map(|w| w.to_string()).collect::<Vec<_>>();
            let flag = || words.get(1) != Some(&"false");
            match keyword {
                "extends" => d.extends = words.get(1).map(|w| w.to_string()),
                "root" => d.is_root = flag(),
                "abstract" => d.is_abstract = flag(),
                "inScope" => d.in_scope.extend(list()),
                "cells" => d.cells = Some(list().into_iter().filter(|w| !w.is_empty()).collect()),
                "catchAllCellType" => d.catch_all_cell_type = words.get(1).map(|w| w.to_string()),
                "cellParser" => {
                    let name = words.get(1).copied().unwrap_or("");
                    d.cell_parser = Some(CellParserKind::from_name(name).ok_or_else(|| {
                        GrammarError::InvalidCellParser {
                            value: name.to_string(),
                            src: self.src(),
                            span: child.get_source_span(),
                        }
                    })?);
                }
                "catchAllParser" => d.catch_all_parser = words.get(1).map(|w| w.to_string()),
                "crux" | "cue" => d.crux = Some(rest()),
                "cruxFromId" => d.crux_from_id = Some(flag()),
                "pattern" => d.pattern = Some(self.regex(&rest(), child, false)?),
                "required" => d.required = Some(flag()),
                "single" => d.single = Some(flag()),
                "uniqueLine" => d.unique_line = Some(flag()),
                "uniqueFirstWord" => d.unique_first_word = Some(flag()),
                "listDelimiter" => d.list_delimiter = Some(rest()),
                "contentKey" => d.content_key = Some(rest()),
                "childrenKey" => d.children_key = Some(rest()),
                "baseParser" => match words.get(1).copied() {
                    Some("blobParser") => d.base = Some(BaseParser::Blob),
                    Some("errorParser") => d.base = Some(BaseParser::Error),
                    other => warn!("{id}: unknown baseParser {other:?}"),
                },
                "tags" => d.tags = Some(list()),
                "description" => d.description = Some(rest()),
                "example" => d.examples.push(child.children_to_string()),
                "compiler" => {
                    for setting in &child.children {
                        let key = setting.first_word();
                        let value = setting.content().unwrap_or("").to_string();
                        if !d.compiler.set(key, value) && !key.is_empty() {
                            warn!("{id}: unknown compiler setting {key}");
                        }
                    }
                }
                "boolean" | "int" | "float" | "string" => {
                    if let Some(name) = words.get(1) {
                        let value = self.constant(keyword, &words[2..], child)?;
                        d.constants.insert(name.to_string(), value);
                    }
                }
                "popularity" | "extensions" | "compilesTo" | "javascript" => {}
                _ if keyword.starts_with("//") => {}
                _ if PARSER_ID.is_match(keyword) => {}
                _ => warn!("{id}: unknown directive {keyword} at line {}", child.line_number),
            }
        }
        Ok(d)
    }

    fn constant(&self, kind: &str, words: &[&str], particle: &Particle) -> Result<Value, GrammarError> {
        if kind == "string" {
            return Ok(if words.is_empty() && !particle.children.is_empty() {
                Value::String(particle.children_to_string())
            } else {
                Value::String(words.join(" "))
            });
        }
        let mut values = Vec::with_capacity(words.len());
        for word in words {
            let value = match kind {
                "boolean" => Value::Boolean(*word == "true"),
                "int" => Value::Int(word.parse().map_err(|_| self.invalid_number(kind, word, particle))?),
                _ => Value::Float(word.parse().map_err(|_| self.invalid_number(kind, word, particle))?),
            };
            values.push(value);
        }
        Ok(match values.len() {
            0 => Value::Null,
            1 => values.remove(0),
            _ => Value::Array(values),
        })
    }

    fn invalid_number(&self, directive: &str, value: &str, particle: &Particle) -> GrammarError {
        GrammarError::InvalidNumber {
            directive: directive.to_string(),
            value: value.to_string(),
            src: self.src(),
            span: particle.get_source_span(),
        }
    }

    fn regex(&self, pattern: &str, particle: &Particle, anchored: bool) -> Result<Regex, GrammarError> {
        let full = if anchored {
            format!("^(?:{pattern})$")
        } else {
            pattern.to_string()
        };
        Regex::new(&full).map_err(|e| GrammarError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
            src: self.src(),
            span: particle.get_source_span(),
        })
    }

    fn cell_directives(&self, particle: &Particle) -> Result<CellDirectives, GrammarError> {
        let mut d = CellDirectives {
            extends: particle.words().get(1).map(|w| w.to_string()),
            ..CellDirectives::default()
        };
        for child in &particle.children {
            let words = child.words();
            let Some(&keyword) = words.first() else {
                continue;
            };
            let list = || words[1..].iter().map(|w| w.to_string()).collect::<Vec<_>>();
            match keyword {
                "extends" => d.extends = words.get(1).map(|w| w.to_string()),
                "regex" => d.regex = Some(self.regex(child.content().unwrap_or(""), child, true)?),
                "reservedWords" => d.reserved_words = Some(list().into_iter().collect()),
                "enum" => d.enum_options = Some(list()),
                "enumFromCellTypes" => d.enum_from_cell_types = Some(list()),
                "min" | "max" => {
                    let raw = words.get(1).copied().unwrap_or("");
                    let value = raw
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| self.invalid_number(keyword, raw, child))?;
                    if keyword == "min" {
                        d.min = Some(value);
                    } else {
                        d.max = Some(value);
                    }
                }
                "examples" => d.examples = Some(list()),
                "description" => d.description = child.content().map(str::to_string),
                "paint" | "highlightScope" => d.paint = words.get(1).map(|w| w.to_string()),
                _ if keyword.starts_with("//") => {}
                _ => warn!(
                    "{}: unknown cell type directive {keyword}",
                    particle.first_word()
                ),
            }
        }
        Ok(d)
    }

    // 2. Resolve chains, scopes and references.

    fn resolve(self, collision_policy: CollisionPolicy) -> Result<Grammar, GrammarError> {
        let (cell_types, cell_type_ids) = self.resolve_cell_types()?;

        let lexical = self.lexical_maps();
        let mut parents = Vec::with_capacity(self.parsers.len());
        for (index, raw) in self.parsers.iter().enumerate() {
            parents.push(match &raw.directives.extends {
                None => None,
                Some(parent) => Some(*lexical[index].get(parent).ok_or_else(|| {
                    GrammarError::UndefinedParent {
                        id: raw.id.clone(),
                        parent: parent.clone(),
                        src: self.src(),
                        span: Self::span_of(raw.particle),
                    }
                })?),
            });
        }
        let chains = self.resolve_chains(
            &parents,
            |i| self.parsers[i].id.as_str(),
            |i| Self::span_of(self.parsers[i].particle),
        )?;

        let mut parsers = Vec::with_capacity(self.parsers.len());
        for (index, chain) in chains.iter().enumerate() {
            let scope = self.scope_map(index, chain, &lexical);
            parsers.push(self.merge_parser(index, chain, scope, &cell_type_ids)?);
        }

        let mut parser_ids = self
            .parsers
            .iter()
            .position(|p| p.enclosing.is_none())
            .map(|top| (*lexical[top]).clone())
            .unwrap_or_default();
        for def in &parsers {
            parser_ids.entry(def.id.clone()).or_insert(def.index);
        }
        let root = parsers
            .iter()
            .rev()
            .find(|p| p.is_root)
            .map(|p| p.index)
            .unwrap_or_default();
        let blob = parser_ids.get(BLOB_PARSER_ID).copied().unwrap_or_default();
        let unknown = parser_ids.get(UNKNOWN_PARSER_ID).copied().unwrap_or_default();

        let grammar = Grammar {
            name: self.name.to_string(),
            cell_types,
            cell_type_ids,
            parsers,
            parser_ids,
            root,
            blob,
            unknown,
            collision_policy,
        };

        if collision_policy == CollisionPolicy::Reject {
            for def in grammar.parsers() {
                let (table, collisions) = grammar.build_dispatch_table(def.index);
                if let Some(collision) = collisions.first() {
                    let second = grammar.parser_at(collision.second);
                    return Err(GrammarError::AmbiguousDispatch {
                        key: collision.key.clone(),
                        first: grammar.parser_at(collision.first).id.clone(),
                        second: second.id.clone(),
                        src: self.src(),
                        span: second.span,
                    });
                }
                // Each definition's cell is filled exactly once here.
                let _ = def.dispatch.set(table);
            }
        }
        Ok(grammar)
    }

    /// Follows parent links from each definition to the root of its chain. A revisit of
    /// a definition already on the resolving stack is a cycle.
    fn resolve_chains<'s>(
        &self,
        parents: &[Option<usize>],
        id_of: impl Fn(usize) -> &'s str,
        span_of: impl Fn(usize) -> SourceSpan,
    ) -> Result<Vec<Vec<usize>>, GrammarError> {
        let mut chains = Vec::with_capacity(parents.len());
        for index in 0..parents.len() {
            let mut resolving_stack = vec![index];
            let mut current = index;
            while let Some(parent) = parents[current] {
                if resolving_stack.contains(&parent) {
                    let mut cycle: Vec<&str> = resolving_stack.iter().map(|&i| id_of(i)).collect();
                    cycle.push(id_of(parent));
                    return Err(GrammarError::CyclicExtends {
                        chain: cycle.join(" -> "),
                        src: self.src(),
                        span: span_of(index),
                    });
                }
                resolving_stack.push(parent);
                current = parent;
            }
            resolving_stack.reverse();
            chains.push(resolving_stack);
        }
        Ok(chains)
    }

    /// Ids visible where each definition is declared: the top-level ids, then the nested
    /// ids of every lexically enclosing definition.
    fn lexical_maps(&self) -> Vec<Arc<HashMap<String, usize>>> {
        let mut top = HashMap::new();
        for (index, raw) in self.parsers.iter().enumerate() {
            if raw.enclosing.is_none() {
                if let Some(previous) = top.insert(raw.id.clone(), index) {
                    warn!("Duplicate parser id {} (definition {previous} replaced)", raw.id);
                }
            }
        }
        let top = Arc::new(top);
        let mut maps: Vec<Arc<HashMap<String, usize>>> = Vec::with_capacity(self.parsers.len());
        for raw in &self.parsers {
            let map = match raw.enclosing {
                None => Arc::clone(&top),
                Some(enclosing) => {
                    let mut inside = (*maps[enclosing]).clone();
                    for &nested in &self.parsers[enclosing].nested {
                        inside.insert(self.parsers[nested].id.clone(), nested);
                    }
                    Arc::new(inside)
                }
            };
            maps.push(map);
        }
        maps
    }

    /// The ids visible to a definition's children: its declaration scope layered with the
    /// nested definitions of itself and of every ancestor.
    fn scope_map(
        &self,
        index: usize,
        chain: &[usize],
        lexical: &[Arc<HashMap<String, usize>>],
    ) -> Arc<HashMap<String, usize>> {
        if chain.iter().all(|&i| self.parsers[i].nested.is_empty()) {
            return Arc::clone(&lexical[index]);
        }
        let mut map = (*lexical[index]).clone();
        for &ancestor in chain {
            for &nested in &self.parsers[ancestor].nested {
                map.insert(self.parsers[nested].id.clone(), nested);
            }
        }
        Arc::new(map)
    }

    fn merge_parser(
        &self,
        index: usize,
        chain: &[usize],
        scope: Arc<HashMap<String, usize>>,
        cell_type_ids: &HashMap<String, usize>,
    ) -> Result<ParserDefinition, GrammarError> {
        let raw = &self.parsers[index];
        let own = &raw.directives;
        let span = Self::span_of(raw.particle);
        let mut def = ParserDefinition::empty(&raw.id, index);
        def.extends = own.extends.clone();
        def.ancestor_indices = chain.to_vec();
        def.ancestors = chain.iter().map(|&i| self.parsers[i].id.clone()).collect();
        def.crux = own.crux.clone();
        def.pattern = own.pattern.clone();
        def.is_abstract = own.is_abstract;
        def.is_root = own.is_root;
        def.examples = own.examples.clone();
        def.is_builtin = raw.particle.is_none();
        def.line_number = raw.particle.map_or(0, |p| p.line_number);
        def.span = span;

        let mut cells = None;
        let mut catch_all_parser = None;
        for &ancestor in chain {
            let raw_ancestor = &self.parsers[ancestor];
            let d = &raw_ancestor.directives;
            if d.cells.is_some() {
                cells.clone_from(&d.cells);
            }
            if d.catch_all_cell_type.is_some() {
                def.catch_all_cell_type.clone_from(&d.catch_all_cell_type);
            }
            if let Some(kind) = d.cell_parser {
                def.cell_parser = kind;
            }
            if d.catch_all_parser.is_some() {
                catch_all_parser.clone_from(&d.catch_all_parser);
            }
            for id in d.in_scope.iter().chain(raw_ancestor.nested.iter().map(|&n| &self.parsers[n].id)) {
                if !def.in_scope.contains(id) {
                    def.in_scope.push(id.clone());
                }
            }
            def.crux_from_id = d.crux_from_id.unwrap_or(def.crux_from_id);
            def.required = d.required.unwrap_or(def.required);
            def.single = d.single.unwrap_or(def.single);
            def.unique_line = d.unique_line.unwrap_or(def.unique_line);
            def.unique_first_word = d.unique_first_word.unwrap_or(def.unique_first_word);
            match d.base {
                Some(BaseParser::Error) if ancestor != index => {}
                Some(base) => def.base = base,
                None => {}
            }
            for (slot, value) in [
                (&mut def.list_delimiter, &d.list_delimiter),
                (&mut def.content_key, &d.content_key),
                (&mut def.children_key, &d.children_key),
                (&mut def.description, &d.description),
            ] {
                if value.is_some() {
                    slot.clone_from(value);
                }
            }
            if let Some(tags) = &d.tags {
                def.tags.clone_from(tags);
            }
            let mut compiler = d.compiler.clone();
            compiler.inherit(&def.compiler);
            def.compiler = compiler;
            def.constants
                .extend(d.constants.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        def.cells = cells.unwrap_or_default();
        for cell in &def.cells {
            let cell_type = cell_type_ids
                .get(cell)
                .ok_or_else(|| self.undefined_cell_type(cell, &raw.id, span))?;
            def.cell_type_indices.push(*cell_type);
        }
        if let Some(cell) = &def.catch_all_cell_type {
            let cell_type = cell_type_ids
                .get(cell)
                .ok_or_else(|| self.undefined_cell_type(cell, &raw.id, span))?;
            def.catch_all_cell_index = Some(*cell_type);
        }
        if let Some(parser) = catch_all_parser {
            def.catch_all_parser = Some(*scope.get(&parser).ok_or_else(|| {
                GrammarError::UndefinedParser {
                    parser: parser.clone(),
                    referenced_by: raw.id.clone(),
                    src: self.src(),
                    span,
                }
            })?);
        }
        for id in &def.in_scope {
            if !scope.contains_key(id) {
                warn!("{}: inScope names unknown parser {id}", raw.id);
            }
        }
        def.scope = scope;
        Ok(def)
    }

    fn undefined_cell_type(&self, cell_type: &str, referenced_by: &str, span: SourceSpan) -> GrammarError {
        GrammarError::UndefinedCellType {
            cell_type: cell_type.to_string(),
            referenced_by: referenced_by.to_string(),
            src: self.src(),
            span,
        }
    }

    fn resolve_cell_types(&self) -> Result<(Vec<CellTypeDefinition>, HashMap<String, usize>), GrammarError> {
        let mut ids = HashMap::new();
        for (index, raw) in self.cells.iter().enumerate() {
            if ids.insert(raw.id.clone(), index).is_some() {
                warn!("Duplicate cell type id {}", raw.id);
            }
        }

        let mut parents = Vec::with_capacity(self.cells.len());
        for raw in &self.cells {
            parents.push(match &raw.directives.extends {
                None => None,
                Some(parent) => Some(*ids.get(parent).ok_or_else(|| GrammarError::UndefinedParent {
                    id: raw.id.clone(),
                    parent: parent.clone(),
                    src: self.src(),
                    span: Self::span_of(raw.particle),
                })?),
            });
        }
        let chains = self.resolve_chains(
            &parents,
            |i| self.cells[i].id.as_str(),
            |i| Self::span_of(self.cells[i].particle),
        )?;

        let mut definitions = Vec::with_capacity(self.cells.len());
        for (index, chain) in chains.iter().enumerate() {
            let raw = &self.cells[index];
            let span = Self::span_of(raw.particle);
            let root_id = &self.cells[chain[0]].id;
            let mut def = CellTypeDefinition {
                id: raw.id.clone(),
                extends: raw.directives.extends.clone(),
                ancestors: chain.iter().map(|&i| self.cells[i].id.clone()).collect(),
                prelude_kind: PreludeKind::from_id(root_id).unwrap_or(PreludeKind::Any),
                validators: Vec::new(),
                enum_options: None,
                enum_from_cell_types: None,
                min: None,
                max: None,
                examples: Vec::new(),
                description: None,
                paint: None,
                is_prelude: raw.particle.is_none(),
                line_number: raw.particle.map_or(0, |p| p.line_number),
                span,
            };
            for &ancestor in chain {
                let d = &self.cells[ancestor].directives;
                if let Some(re) = &d.regex {
                    def.validators.push(Validator::Regex(re.clone()));
                }
                if let Some(reserved) = &d.reserved_words {
                    def.validators.push(Validator::ReservedWords(reserved.clone()));
                }
                if let Some(options) = &d.enum_options {
                    def.validators.push(Validator::Enum(options.clone()));
                    let mut sorted = options.clone();
                    sort_longest_first(&mut sorted);
                    def.enum_options = Some(sorted);
                }
                if let Some(from) = &d.enum_from_cell_types {
                    for id in from {
                        if !ids.contains_key(id) {
                            return Err(self.undefined_cell_type(id, &raw.id, span));
                        }
                    }
                    def.validators.push(Validator::EnumFromCellTypes(from.clone()));
                    def.enum_from_cell_types = Some(from.clone());
                }
                def.min = d.min.or(def.min);
                def.max = d.max.or(def.max);
                if let Some(examples) = &d.examples {
                    def.examples.clone_from(examples);
                }
                if d.description.is_some() {
                    def.description.clone_from(&d.description);
                }
                if d.paint.is_some() {
                    def.paint.clone_from(&d.paint);
                }
            }
            definitions.push(def);
        }
        Ok((definitions, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> Grammar {
        compile(source, &GrammarOptions::default()).unwrap_or_else(|e| {
            panic!("{:?}", miette::Report::new(e));
        })
    }

    #[test]
    fn test_prelude_cells_are_implicit() {
        let grammar = compile_ok("");
        for (id, kind) in PreludeKind::IDS {
            assert_eq!(grammar.cell_type(id).unwrap().prelude_kind, kind);
        }
        assert_eq!(grammar.root_definition().id, DEFAULT_ROOT_PARSER_ID);
    }

    #[test]
    fn test_header_second_word_extends() {
        let grammar = compile_ok("abstractThingParser\n cells keywordCell\nfooParser abstractThingParser\n crux foo");
        let foo = grammar.parser("fooParser").unwrap();
        assert_eq!(foo.ancestors, vec!["abstractThingParser", "fooParser"]);
        assert_eq!(foo.cells, vec!["keywordCell"]);
        assert!(grammar.parser("abstractThingParser").unwrap().is_abstract);
    }

    #[test]
    fn test_cell_validators_accumulate() {
        let grammar = compile_ok("lowerCell\n regex [a-z]+\nshortCell lowerCell\n regex .{1,3}");
        let short = grammar.cell_type("shortCell").unwrap();
        assert_eq!(short.validators.len(), 2);
        assert!(short.is_valid("abc", None));
        assert!(!short.is_valid("abcd", None));
        assert!(!short.is_valid("AB", None));
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = compile("aParser bParser\nbParser aParser", &GrammarOptions::default()).unwrap_err();
        match err {
            GrammarError::CyclicExtends { chain, .. } => assert_eq!(chain, "aParser -> bParser -> aParser"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_self_first_constants() {
        let grammar = compile_ok(
            "baseThingParser\n int size 1\n string label base\nthingParser baseThingParser\n int size 2 3",
        );
        let thing = grammar.parser("thingParser").unwrap();
        assert_eq!(thing.constants()["size"], Value::Array(vec![Value::Int(2), Value::Int(3)]));
        assert_eq!(thing.constants()["label"], Value::String("base".into()));
    }
}
