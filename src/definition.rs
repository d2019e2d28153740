use crate::serialization::Value;
use indexmap::IndexMap;
use miette::SourceSpan;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Suffix that marks a parser definition id.
pub const PARSER_SUFFIX: &str = "Parser";
/// Suffix that marks a cell type id.
pub const CELL_SUFFIX: &str = "Cell";

pub const BLOB_PARSER_ID: &str = "BlobParser";
pub const UNKNOWN_PARSER_ID: &str = "UnknownParser";
pub const DEFAULT_ROOT_PARSER_ID: &str = "DefaultRootParser";

/// Tag that keeps a definition out of synthesized programs.
pub const DO_NOT_SYNTHESIZE_TAG: &str = "doNotSynthesize";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellParserKind {
    #[default]
    Prefix,
    Postfix,
    Omnifix,
}

impl CellParserKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prefix" => Some(Self::Prefix),
            "postfix" => Some(Self::Postfix),
            "omnifix" => Some(Self::Omnifix),
            _ => None,
        }
    }
}

/// Built-in behaviour a parser definition can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseParser {
    #[default]
    Standard,
    /// Accepts any line and any children without errors.
    Blob,
    /// Always reports an unknown-parser error.
    Error,
}

/// Settings of a definition's `compiler` block. Unset fields fall back to the closest
/// ancestor that sets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerSettings {
    pub string_template: Option<String>,
    pub indent_character: Option<String>,
    pub catch_all_cell_delimiter: Option<String>,
    pub open_children: Option<String>,
    pub close_children: Option<String>,
    pub join_children_with: Option<String>,
}

impl CompilerSettings {
    pub(crate) fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "stringTemplate" => &mut self.string_template,
            "indentCharacter" => &mut self.indent_character,
            "catchAllCellDelimiter" => &mut self.catch_all_cell_delimiter,
            "openChildren" => &mut self.open_children,
            "closeChildren" => &mut self.close_children,
            "joinChildrenWith" => &mut self.join_children_with,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Fills every unset field from `inherited`.
    pub(crate) fn inherit(&mut self, inherited: &CompilerSettings) {
        fn fill(slot: &mut Option<String>, from: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }
        fill(&mut self.string_template, &inherited.string_template);
        fill(&mut self.indent_character, &inherited.indent_character);
        fill(&mut self.catch_all_cell_delimiter, &inherited.catch_all_cell_delimiter);
        fill(&mut self.open_children, &inherited.open_children);
        fill(&mut self.close_children, &inherited.close_children);
        fill(&mut self.join_children_with, &inherited.join_children_with);
    }
}

/// A resolved parser (line) type. Inherited properties are already merged in.
#[derive(Debug)]
pub struct ParserDefinition {
    pub id: String,
    pub index: usize,
    pub extends: Option<String>,
    /// Ancestor ids from the root of the extends chain down to this definition.
    pub ancestors: Vec<String>,
    pub(crate) ancestor_indices: Vec<usize>,
    /// Required cell type ids, in order.
    pub cells: Vec<String>,
    pub(crate) cell_type_indices: Vec<usize>,
    pub catch_all_cell_type: Option<String>,
    pub(crate) catch_all_cell_index: Option<usize>,
    pub cell_parser: CellParserKind,
    pub catch_all_parser: Option<usize>,
    /// Own and inherited `inScope` ids, including nested definitions.
    pub in_scope: Vec<String>,
    pub crux: Option<String>,
    pub pattern: Option<Regex>,
    pub crux_from_id: bool,
    pub required: bool,
    pub single: bool,
    pub unique_line: bool,
    pub unique_first_word: bool,
    pub is_abstract: bool,
    pub is_root: bool,
    pub base: BaseParser,
    pub list_delimiter: Option<String>,
    pub content_key: Option<String>,
    pub children_key: Option<String>,
    pub compiler: CompilerSettings,
    pub constants: BTreeMap<String, Value>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    /// Own `example` blocks, each a small program in the defined language.
    pub examples: Vec<String>,
    pub is_builtin: bool,
    pub line_number: usize,
    pub span: SourceSpan,
    /// Parser ids visible from inside this definition.
    pub(crate) scope: Arc<HashMap<String, usize>>,
    pub(crate) dispatch: OnceCell<DispatchTable>,
}

impl ParserDefinition {
    /// A definition with no directives: no cells, no scope, prefix alignment.
    pub(crate) fn empty(id: &str, index: usize) -> Self {
        Self {
            id: id.to_string(),
            index,
            extends: None,
            ancestors: vec![id.to_string()],
            ancestor_indices: vec![index],
            cells: Vec::new(),
            cell_type_indices: Vec::new(),
            catch_all_cell_type: None,
            catch_all_cell_index: None,
            cell_parser: CellParserKind::Prefix,
            catch_all_parser: None,
            in_scope: Vec::new(),
            crux: None,
            pattern: None,
            crux_from_id: false,
            required: false,
            single: false,
            unique_line: false,
            unique_first_word: false,
            is_abstract: false,
            is_root: false,
            base: BaseParser::Standard,
            list_delimiter: None,
            content_key: None,
            children_key: None,
            compiler: CompilerSettings::default(),
            constants: BTreeMap::new(),
            tags: Vec::new(),
            description: None,
            examples: Vec::new(),
            is_builtin: false,
            line_number: 0,
            span: (0, 0).into(),
            scope: Arc::new(HashMap::new()),
            dispatch: OnceCell::new(),
        }
    }

    /// The id with its `Parser` suffix removed.
    pub fn id_stem(&self) -> &str {
        self.id.strip_suffix(PARSER_SUFFIX).unwrap_or(&self.id)
    }

    /// The literal first word this definition is dispatched on, if it has exactly one.
    pub fn crux_if_any(&self) -> Option<&str> {
        match &self.crux {
            Some(crux) => Some(crux),
            None if self.crux_from_id => Some(self.id_stem()),
            None => None,
        }
    }

    /// Whether this definition is `id` or extends it, directly or transitively.
    pub fn extends_or_is(&self, id: &str) -> bool {
        self.ancestors.iter().any(|a| a == id)
    }

    pub(crate) fn extends_or_is_index(&self, index: usize) -> bool {
        self.ancestor_indices.contains(&index)
    }

    pub fn is_blob(&self) -> bool {
        self.base == BaseParser::Blob
    }

    pub fn is_error(&self) -> bool {
        self.base == BaseParser::Error
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Merged `boolean`/`int`/`float`/`string` constants.
    pub fn constants(&self) -> &BTreeMap<String, Value> {
        &self.constants
    }

    /// One-line summary of what a line of this type looks like.
    pub fn line_hints(&self) -> String {
        let name = self.crux_if_any().unwrap_or(&self.id);
        let catch_all = self
            .catch_all_cell_type
            .as_ref()
            .map(|c| format!(" {c}..."))
            .unwrap_or_default();
        format!("{name}: {}{catch_all}", self.cells.join(" "))
    }
}

/// How the children of one scope are matched to definitions.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    /// First word to definition, in declaration order.
    pub literals: IndexMap<String, usize>,
    /// Tried in order against the whole line when no literal matches.
    pub patterns: Vec<(Regex, usize)>,
    pub catch_all: Option<usize>,
    /// Every concrete definition allowed in the scope, dispatchable or not.
    pub candidates: Vec<usize>,
    pub required: Vec<usize>,
}

impl DispatchTable {
    /// The definition a line dispatches to, without the catch-all fallback.
    pub fn lookup(&self, line: &str) -> Option<usize> {
        let first_word = line.split(crate::ast::WORD_BREAK).next().unwrap_or("");
        if let Some(index) = self.literals.get(first_word) {
            return Some(*index);
        }
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(line))
            .map(|(_, index)| *index)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.literals.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.patterns.is_empty() && self.catch_all.is_none()
    }
}
