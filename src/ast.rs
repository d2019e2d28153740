use miette::SourceSpan;
use std::fmt::Display;

/// The word separator inside a line.
pub const WORD_BREAK: char = ' ';

/// A raw line of indentation-structured text together with its indented children.
///
/// This is the untyped tree shared by grammar sources and documents: it knows nothing
/// about parser or cell types.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Particle {
    pub line: String,
    pub children: Vec<Particle>,
    /// 1-based line number in the source; 0 for a synthetic root.
    pub line_number: usize,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Particle {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            ..Self::default()
        }
    }

    /// The words of the line. An empty line has no words.
    pub fn words(&self) -> Vec<&str> {
        split_words(&self.line)
    }

    pub fn first_word(&self) -> &str {
        self.line.split(WORD_BREAK).next().unwrap_or("")
    }

    /// Words from `index` onwards.
    pub fn words_from(&self, index: usize) -> Vec<&str> {
        self.words().into_iter().skip(index).collect()
    }

    /// Everything after the first word and its separator, if anything.
    pub fn content(&self) -> Option<&str> {
        self.line.split_once(WORD_BREAK).map(|(_, rest)| rest)
    }

    /// The first child whose first word is `key`.
    pub fn find(&self, key: &str) -> Option<&Particle> {
        self.children.iter().find(|c| c.first_word() == key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Content of the first child keyed by `key` (empty string if the child has no content).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).map(|c| c.content().unwrap_or(""))
    }

    /// Children rendered back to text, indented relative to this particle.
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

    pub fn get_source_span(&self) -> SourceSpan {
        (self.pos_start, self.pos_end - self.pos_start).into()
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut lines = Vec::new();
        self.write_lines(0, &mut lines);
        write!(f, "{}", lines.join("\n"))
    }
}

/// Splits a line into words on single spaces. Repeated spaces yield empty words.
pub fn split_words(line: &str) -> Vec<&str> {
    if line.is_empty() {
        Vec::new()
    } else {
        line.split(WORD_BREAK).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_and_content() {
        let p = Particle::new("add 5 6");
        assert_eq!(p.words(), vec!["add", "5", "6"]);
        assert_eq!(p.first_word(), "add");
        assert_eq!(p.content(), Some("5 6"));
        assert_eq!(p.words_from(1), vec!["5", "6"]);
    }

    #[test]
    fn test_empty_line() {
        let p = Particle::new("");
        assert!(p.words().is_empty());
        assert_eq!(p.first_word(), "");
        assert_eq!(p.content(), None);
    }

    #[test]
    fn test_children_to_string() {
        let mut p = Particle::new("example");
        let mut child = Particle::new("apple");
        child.children.push(Particle::new("banana"));
        p.children.push(child);
        assert_eq!(p.children_to_string(), "apple\n banana");
        assert_eq!(p.to_string(), "example\n apple\n  banana");
    }
}
