use crate::serialization::Value;
use miette::SourceSpan;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::rc::Rc;

static FLOAT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d*(\.\d+)?([eE][+-]?\d+)?$").expect("static float regex"));

const TRUE_WORDS: [&str; 4] = ["1", "true", "t", "yes"];
const FALSE_WORDS: [&str; 4] = ["0", "false", "f", "no"];

/// Default bounds used when a numeric cell type declares no `min`/`max`.
pub const DEFAULT_MIN: f64 = 0.0;
pub const DEFAULT_MAX: f64 = 100.0;

/// The built-in primitive a cell type ultimately derives from. It decides the intrinsic
/// validity check, native value coercion and default paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreludeKind {
    Any,
    Keyword,
    ExtraWord,
    Float,
    Int,
    Bit,
    Bool,
}

impl PreludeKind {
    /// Prelude cell type ids. `numberCell` is an alias of `floatCell`.
    pub const IDS: [(&'static str, PreludeKind); 8] = [
        ("anyCell", PreludeKind::Any),
        ("keywordCell", PreludeKind::Keyword),
        ("extraWordCell", PreludeKind::ExtraWord),
        ("floatCell", PreludeKind::Float),
        ("numberCell", PreludeKind::Float),
        ("bitCell", PreludeKind::Bit),
        ("boolCell", PreludeKind::Bool),
        ("intCell", PreludeKind::Int),
    ];

    pub fn from_id(id: &str) -> Option<PreludeKind> {
        Self::IDS
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, kind)| *kind)
    }

    pub fn id(&self) -> &'static str {
        match self {
            PreludeKind::Any => "anyCell",
            PreludeKind::Keyword => "keywordCell",
            PreludeKind::ExtraWord => "extraWordCell",
            PreludeKind::Float => "floatCell",
            PreludeKind::Int => "intCell",
            PreludeKind::Bit => "bitCell",
            PreludeKind::Bool => "boolCell",
        }
    }

    pub fn default_paint(&self) -> Option<&'static str> {
        match self {
            PreludeKind::Keyword => Some("keyword"),
            PreludeKind::Float => Some("constant.numeric.float"),
            PreludeKind::Int => Some("constant.numeric.integer"),
            PreludeKind::Bit | PreludeKind::Bool => Some("constant.numeric"),
            PreludeKind::Any | PreludeKind::ExtraWord => None,
        }
    }

    /// The kind-specific check every word must pass on top of declared validators.
    pub fn accepts(&self, word: &str) -> bool {
        match self {
            PreludeKind::Any | PreludeKind::Keyword => true,
            PreludeKind::ExtraWord => false,
            PreludeKind::Bit => word == "0" || word == "1",
            PreludeKind::Int => word
                .parse::<i64>()
                .map(|n| n.to_string() == word)
                .unwrap_or(false),
            PreludeKind::Float => FLOAT_WORD.is_match(word) && word.parse::<f64>().is_ok(),
            PreludeKind::Bool => {
                let lower = word.to_lowercase();
                TRUE_WORDS.contains(&lower.as_str()) || FALSE_WORDS.contains(&lower.as_str())
            }
        }
    }

    /// Coerces a word to its native value. Words that do not parse become `Null`.
    pub fn parse(&self, word: &str) -> Value {
        match self {
            PreludeKind::Any | PreludeKind::Keyword | PreludeKind::ExtraWord => {
                Value::String(word.to_string())
            }
            PreludeKind::Bit => Value::Boolean(word == "1"),
            PreludeKind::Int => word.parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
            PreludeKind::Float => word.parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
            PreludeKind::Bool => Value::Boolean(TRUE_WORDS.contains(&word.to_lowercase().as_str())),
        }
    }

    /// Every spelling a bool cell accepts, trues first.
    pub fn bool_words() -> impl Iterator<Item = &'static str> {
        TRUE_WORDS.into_iter().chain(FALSE_WORDS)
    }
}

impl Display for PreludeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Looks up the words in a document that were typed with one of a set of cell types.
/// Implemented by a parsed document, which memoizes the answer per document version.
pub trait TypedWordSource {
    fn words_typed_with(&self, cell_type_ids: &[String]) -> Rc<BTreeSet<String>>;
}

#[derive(Debug, Clone)]
pub enum Validator {
    /// The whole word must match.
    Regex(Regex),
    ReservedWords(HashSet<String>),
    Enum(Vec<String>),
    /// The word must appear somewhere in the document typed as one of these cell types.
    EnumFromCellTypes(Vec<String>),
}

impl Validator {
    /// `words` is `None` while cells are still being aligned; document-dependent
    /// validators accept everything in that case.
    pub fn accepts(&self, word: &str, words: Option<&dyn TypedWordSource>) -> bool {
        match self {
            Validator::Regex(re) => re.is_match(word),
            Validator::ReservedWords(reserved) => !reserved.contains(word),
            Validator::Enum(options) => options.iter().any(|o| o == word),
            Validator::EnumFromCellTypes(ids) => match words {
                Some(source) => source.words_typed_with(ids).contains(word),
                None => true,
            },
        }
    }
}

/// A fully resolved cell type: its own directives merged with everything it inherits.
#[derive(Debug, Clone)]
pub struct CellTypeDefinition {
    pub id: String,
    pub extends: Option<String>,
    /// Ancestor ids from the root of the extends chain down to this definition.
    pub ancestors: Vec<String>,
    pub prelude_kind: PreludeKind,
    /// Validators from the whole chain; all of them must accept a word.
    pub validators: Vec<Validator>,
    /// Options of the closest `enum`, longest first.
    pub enum_options: Option<Vec<String>>,
    /// Cell type ids of the closest `enumFromCellTypes`.
    pub enum_from_cell_types: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub examples: Vec<String>,
    pub description: Option<String>,
    pub paint: Option<String>,
    /// Whether this definition came from the prelude rather than the grammar source.
    pub is_prelude: bool,
    pub line_number: usize,
    pub span: SourceSpan,
}

impl CellTypeDefinition {
    pub fn is_valid(&self, word: &str, words: Option<&dyn TypedWordSource>) -> bool {
        self.prelude_kind.accepts(word) && self.validators.iter().all(|v| v.accepts(word, words))
    }

    pub fn parse(&self, word: &str) -> Value {
        self.prelude_kind.parse(word)
    }

    /// Display tag: the closest declared `paint`, else the prelude kind's default.
    pub fn paint(&self) -> Option<&str> {
        self.paint
            .as_deref()
            .or_else(|| self.prelude_kind.default_paint())
    }

    pub fn min_or_default(&self) -> f64 {
        self.min.unwrap_or(DEFAULT_MIN)
    }

    pub fn max_or_default(&self) -> f64 {
        self.max.unwrap_or(DEFAULT_MAX)
    }

    /// Words worth offering in autocomplete. Free-form types offer nothing.
    pub fn autocomplete_options(&self, words: Option<&dyn TypedWordSource>) -> Vec<String> {
        if let Some(options) = &self.enum_options {
            return options.clone();
        }
        match (&self.enum_from_cell_types, words) {
            (Some(ids), Some(source)) => source.words_typed_with(ids).iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn extends_or_is(&self, id: &str) -> bool {
        self.ancestors.iter().any(|a| a == id)
    }
}

/// Sorts enum options longest first so the longest option is tried first. Equal lengths
/// keep their declared order.
pub fn sort_longest_first(options: &mut [String]) {
    options.sort_by(|a, b| b.len().cmp(&a.len()));
}
