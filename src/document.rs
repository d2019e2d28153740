use crate::ast::{split_words, Particle, WORD_BREAK};
use crate::cell_type::TypedWordSource;
use crate::cells::{align, Cell};
use crate::definition::ParserDefinition;
use crate::grammar::Grammar;
use crate::parser::parse_particles;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::rc::Rc;

/// Stable identity of a node within one document, kept across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

/// One line of a document bound to a parser definition, with its indented children.
#[derive(Debug)]
pub struct DocumentNode {
    id: NodeId,
    line: String,
    children: Vec<DocumentNode>,
    parser: usize,
    version: u64,
    cells: OnceCell<Rc<[Cell]>>,
}

impl DocumentNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    /// Index of the bound definition in [`Grammar::parsers`].
    pub fn parser_index(&self) -> usize {
        self.parser
    }

    /// Document version at which this node last changed.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn words(&self) -> Vec<&str> {
        split_words(&self.line)
    }

    pub fn first_word(&self) -> &str {
        self.line.split(WORD_BREAK).next().unwrap_or("")
    }

    pub fn content(&self) -> Option<&str> {
        self.line.split_once(WORD_BREAK).map(|(_, rest)| rest)
    }

    /// The subtree below this node as source text.
    pub fn children_to_string(&self) -> String {
        let mut lines = Vec::new();
        for child in &self.children {
            child.write_lines(0, &mut lines);
        }
        lines.join("\n")
    }

    fn write_lines(&self, depth: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", " ".repeat(depth), self.line));
        for child in &self.children {
            child.write_lines(depth + 1, out);
        }
    }

    fn invalidate(&mut self, version: u64) {
        self.version = version;
        self.cells = OnceCell::new();
    }
}

/// A node visited in document order.
#[derive(Debug, Clone, Copy)]
pub struct NodeEntry<'d> {
    pub node: &'d DocumentNode,
    pub parent: &'d DocumentNode,
    /// 0 for top-level lines.
    pub depth: usize,
    /// 1-based source line.
    pub line_number: usize,
}

/// Where a word of a given cell type occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordLocation {
    pub line_number: usize,
    pub cell_index: usize,
    pub word: String,
}

#[derive(Debug, Default)]
struct TypedWordCache {
    version: u64,
    words: HashMap<Vec<String>, Rc<BTreeSet<String>>>,
}

/// A program parsed against a grammar. The root node is synthetic: it has an empty line
/// and is bound to the grammar's root definition.
#[derive(Debug)]
pub struct Document<'g> {
    grammar: &'g Grammar,
    root: DocumentNode,
    next_id: u64,
    version: u64,
    typed_words: RefCell<TypedWordCache>,
}

impl<'g> Document<'g> {
    pub fn new(grammar: &'g Grammar, text: &str) -> Self {
        let particles = parse_particles(text);
        let mut document = Self {
            grammar,
            root: DocumentNode {
                id: NodeId(0),
                line: String::new(),
                children: Vec::new(),
                parser: grammar.root_definition().index,
                version: 0,
                cells: OnceCell::new(),
            },
            next_id: 1,
            version: 0,
            typed_words: RefCell::new(TypedWordCache::default()),
        };
        let scope = document.root.parser;
        let children = particles
            .children
            .iter()
            .map(|p| document.build(p, scope))
            .collect();
        document.root.children = children;
        document
    }

    fn build(&mut self, particle: &Particle, scope: usize) -> DocumentNode {
        let parser = self.grammar.bind(scope, &particle.line);
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let children = particle
            .children
            .iter()
            .map(|c| self.build(c, parser))
            .collect();
        DocumentNode {
            id,
            line: particle.line.clone(),
            children,
            parser,
            version: self.version,
            cells: OnceCell::new(),
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn root(&self) -> &DocumentNode {
        &self.root
    }

    /// Incremented on every edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn definition(&self, node: &DocumentNode) -> &'g ParserDefinition {
        self.grammar.parser_at(node.parser)
    }

    /// The node's cells, aligned on first use and cached until the node changes.
    /// The root has no cells.
    pub fn cells(&self, node: &DocumentNode) -> Rc<[Cell]> {
        if node.id == self.root.id {
            return Rc::from(Vec::new());
        }
        Rc::clone(
            node.cells
                .get_or_init(|| align(self.grammar, self.definition(node), &node.line).into()),
        )
    }

    /// Every non-root node in document order.
    pub fn walk(&self) -> Vec<NodeEntry<'_>> {
        let mut entries = Vec::new();
        Self::walk_into(&self.root, 0, &mut entries);
        entries
    }

    fn walk_into<'d>(parent: &'d DocumentNode, depth: usize, entries: &mut Vec<NodeEntry<'d>>) {
        for node in &parent.children {
            let line_number = entries.len() + 1;
            entries.push(NodeEntry {
                node,
                parent,
                depth,
                line_number,
            });
            Self::walk_into(node, depth + 1, entries);
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&DocumentNode> {
        fn search(node: &DocumentNode, id: NodeId) -> Option<&DocumentNode> {
            if node.id == id {
                return Some(node);
            }
            node.children.iter().find_map(|c| search(c, id))
        }
        search(&self.root, id)
    }

    pub fn node_at_line(&self, line_number: usize) -> Option<NodeEntry<'_>> {
        self.walk().into_iter().nth(line_number.checked_sub(1)?)
    }

    pub fn line_count(&self) -> usize {
        self.walk().len()
    }

    // Edits. Each one rebinds the touched subtree and bumps the document version.

    fn parent_of_mut(node: &mut DocumentNode, id: NodeId) -> Option<&mut DocumentNode> {
        if node.children.iter().any(|c| c.id == id) {
            return Some(node);
        }
        node.children
            .iter_mut()
            .find_map(|c| Self::parent_of_mut(c, id))
    }

    fn find_mut(node: &mut DocumentNode, id: NodeId) -> Option<&mut DocumentNode> {
        if node.id == id {
            return Some(node);
        }
        node.children.iter_mut().find_map(|c| Self::find_mut(c, id))
    }

    fn rebind(grammar: &Grammar, node: &mut DocumentNode, scope: usize, version: u64) {
        node.parser = grammar.bind(scope, &node.line);
        node.invalidate(version);
        let parser = node.parser;
        for child in &mut node.children {
            Self::rebind(grammar, child, parser, version);
        }
    }

    /// Replaces a node's line. Returns `false` if the node is not in the document or is
    /// the root.
    pub fn set_line(&mut self, id: NodeId, line: &str) -> bool {
        self.version += 1;
        let (grammar, version) = (self.grammar, self.version);
        let Some(parent) = Self::parent_of_mut(&mut self.root, id) else {
            return false;
        };
        let scope = parent.parser;
        parent.version = version;
        match parent.children.iter_mut().find(|c| c.id == id) {
            Some(node) => {
                node.line = line.to_string();
                Self::rebind(grammar, node, scope, version);
                true
            }
            None => false,
        }
    }

    pub fn set_word(&mut self, id: NodeId, index: usize, word: &str) -> bool {
        let Some(node) = self.find(id) else {
            return false;
        };
        let mut words: Vec<String> = node.words().into_iter().map(str::to_string).collect();
        match index.cmp(&words.len()) {
            std::cmp::Ordering::Less => words[index] = word.to_string(),
            std::cmp::Ordering::Equal => words.push(word.to_string()),
            std::cmp::Ordering::Greater => return false,
        }
        self.set_line(id, &words.join(" "))
    }

    pub fn delete_word(&mut self, id: NodeId, index: usize) -> bool {
        let Some(node) = self.find(id) else {
            return false;
        };
        let mut words = node.words();
        if index >= words.len() {
            return false;
        }
        words.remove(index);
        let line = words.join(" ");
        self.set_line(id, &line)
    }

    pub fn delete_node(&mut self, id: NodeId) -> bool {
        self.version += 1;
        let version = self.version;
        let Some(parent) = Self::parent_of_mut(&mut self.root, id) else {
            return false;
        };
        parent.children.retain(|c| c.id != id);
        parent.version = version;
        true
    }

    /// Parses `text` and appends its top-level lines (with their children) under `parent`.
    /// Returns the ids of the appended lines.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Vec<NodeId> {
        let Some(scope) = self.find(parent).map(|p| p.parser) else {
            return Vec::new();
        };
        self.version += 1;
        let particles = parse_particles(text);
        let built: Vec<DocumentNode> = particles
            .children
            .iter()
            .map(|p| self.build(p, scope))
            .collect();
        let ids = built.iter().map(|n| n.id).collect();
        let version = self.version;
        if let Some(target) = Self::find_mut(&mut self.root, parent) {
            target.children.extend(built);
            target.version = version;
        }
        ids
    }

    // Whole-document queries.

    /// Each line replaced by the ids of its cell types.
    pub fn to_cell_type_lines(&self) -> String {
        self.walk()
            .iter()
            .map(|entry| {
                let cells = self.cells(entry.node);
                let ids: Vec<&str> = cells.iter().map(|c| c.cell_type_id.as_str()).collect();
                format!("{}{}", " ".repeat(entry.depth), ids.join(" "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every word typed with `cell_type_id` or a type extending it.
    pub fn find_all_words_with_cell_type(&self, cell_type_id: &str) -> Vec<WordLocation> {
        let mut found = Vec::new();
        for entry in self.walk() {
            for cell in self.cells(entry.node).iter() {
                let matches = cell
                    .definition(self.grammar)
                    .is_some_and(|d| d.extends_or_is(cell_type_id));
                if let (true, Some(word)) = (matches, &cell.word) {
                    found.push(WordLocation {
                        line_number: entry.line_number,
                        cell_index: cell.index,
                        word: word.clone(),
                    });
                }
            }
        }
        found
    }

    /// Nodes bound to exactly `parser_id`.
    pub fn find_all_nodes_with_parser(&self, parser_id: &str) -> Vec<&DocumentNode> {
        self.walk()
            .into_iter()
            .filter(|e| self.definition(e.node).id == parser_id)
            .map(|e| e.node)
            .collect()
    }

    /// Distinct first words of lines no definition accepted, in order of appearance.
    pub fn invalid_parsers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in self.walk() {
            let word = entry.node.first_word();
            if self.definition(entry.node).is_error() && !seen.iter().any(|s| s == word) {
                seen.push(word.to_string());
            }
        }
        seen
    }
}

impl TypedWordSource for Document<'_> {
    fn words_typed_with(&self, cell_type_ids: &[String]) -> Rc<BTreeSet<String>> {
        {
            let cache = self.typed_words.borrow();
            if cache.version == self.version {
                if let Some(words) = cache.words.get(cell_type_ids) {
                    return Rc::clone(words);
                }
            }
        }
        let mut words = BTreeSet::new();
        for entry in self.walk() {
            for cell in self.cells(entry.node).iter() {
                let typed = cell
                    .definition(self.grammar)
                    .is_some_and(|d| cell_type_ids.iter().any(|id| d.extends_or_is(id)));
                match &cell.word {
                    Some(word) if typed && !word.is_empty() => {
                        words.insert(word.clone());
                    }
                    _ => {}
                }
            }
        }
        let words = Rc::new(words);
        let mut cache = self.typed_words.borrow_mut();
        if cache.version != self.version {
            cache.words.clear();
            cache.version = self.version;
        }
        cache.words.insert(cell_type_ids.to_vec(), Rc::clone(&words));
        words
    }
}

impl Display for Document<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root.children_to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::compile_grammar;
    use crate::cell_type::TypedWordSource;

    const GRAMMAR: &str = "keywordCell
nameCell
refCell
 enumFromCellTypes nameCell
programParser
 root
 inScope defParser useParser
defParser
 crux def
 cells keywordCell nameCell
useParser
 crux use
 cells keywordCell refCell";

    #[test]
    fn test_round_trip_text() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let source = "def a\nuse a\n nested child";
        assert_eq!(grammar.parse(source).to_string(), source);
    }

    #[test]
    fn test_typed_words_follow_edits() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let mut doc = grammar.parse("def a\ndef b\nuse a");
        let ids = vec!["nameCell".to_string()];
        let words = doc.words_typed_with(&ids);
        assert!(words.contains("a") && words.contains("b"));

        let first = doc.root().children()[0].id();
        assert!(doc.set_line(first, "def c"));
        let words = doc.words_typed_with(&ids);
        assert!(words.contains("c"));
        assert!(!words.contains("a"));
    }

    #[test]
    fn test_edits_rebind() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let mut doc = grammar.parse("bogus x");
        let id = doc.root().children()[0].id();
        assert!(doc.definition(&doc.root().children()[0]).is_error());
        assert!(doc.set_word(id, 0, "def"));
        assert_eq!(doc.definition(doc.find(id).unwrap()).id, "defParser");
        assert!(doc.delete_word(id, 1));
        assert_eq!(doc.find(id).unwrap().line(), "def");
        assert!(doc.delete_node(id));
        assert!(doc.find(id).is_none());
        assert!(!doc.delete_node(id));
    }

    #[test]
    fn test_queries() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("def a\nwhat\nuse a\nwhat else");
        assert_eq!(doc.find_all_nodes_with_parser("defParser").len(), 1);
        assert_eq!(doc.invalid_parsers(), vec!["what"]);
        let words = doc.find_all_words_with_cell_type("nameCell");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].line_number, 1);
        assert_eq!(words[0].cell_index, 1);
        assert_eq!(
            doc.to_cell_type_lines(),
            "keywordCell nameCell\n\nkeywordCell refCell\n"
        );
    }
}
