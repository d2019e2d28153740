use crate::ast::Particle;
use crate::lexer::{Lexer, LineToken};

/// Builds the indentation tree for a source text.
///
/// Each line becomes a child of the closest preceding line that is exactly one level
/// shallower. A line indented past its predecessor + 1 is attached one level below that
/// predecessor and keeps the surplus spaces in its text.
#[derive(Debug)]
pub struct Parser<'a> {
    tokens: Vec<LineToken>,
    position: usize,
    source_text: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Self {
        let tokens = Lexer::new(source_text).lex();
        Self {
            tokens,
            position: 0,
            source_text,
        }
    }

    pub fn source_text(&self) -> &'a str {
        self.source_text
    }

    /// Document ::= { Line }
    /// Returns a synthetic root (empty line, line number 0) holding the top-level lines.
    pub fn parse_document(&mut self) -> Particle {
        let mut root = Particle::new("");
        root.pos_end = self.source_text.len();
        // stack[d] is the open particle at depth d - 1; stack[0] is the root.
        let mut stack: Vec<Particle> = vec![root];

        while let Some(token) = self.advance() {
            let max_depth = stack.len() - 1;
            let depth = token.depth.min(max_depth);
            let surplus = token.depth - depth;

            while stack.len() > depth + 1 {
                Self::close(&mut stack);
            }

            let mut text = " ".repeat(surplus);
            text.push_str(&token.text);
            stack.push(Particle {
                line: text,
                children: Vec::new(),
                line_number: token.line_number,
                pos_start: token.pos_start - surplus,
                pos_end: token.pos_end,
            });
        }

        while stack.len() > 1 {
            Self::close(&mut stack);
        }
        stack.pop().unwrap_or_default()
    }

    fn close(stack: &mut Vec<Particle>) {
        if let Some(done) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(done);
            }
        }
    }

    fn advance(&mut self) -> Option<LineToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }
}

/// Parses `source` into its indentation tree.
pub fn parse_particles(source: &str) -> Particle {
    Parser::new(source).parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting() {
        let root = parse_particles("a\n b\n  c\nd");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].line, "a");
        assert_eq!(root.children[0].children[0].line, "b");
        assert_eq!(root.children[0].children[0].children[0].line, "c");
        assert_eq!(root.children[1].line, "d");
        assert_eq!(root.children[1].line_number, 4);
    }

    #[test]
    fn test_overindented_line_keeps_surplus_spaces() {
        let root = parse_particles("a\n   b");
        let b = &root.children[0].children[0];
        assert_eq!(b.line, "  b");
    }

    #[test]
    fn test_first_line_indented() {
        let root = parse_particles(" a");
        assert_eq!(root.children[0].line, " a");
    }

    #[test]
    fn test_round_trip() {
        let source = "a\n b\n  c\n d\ne";
        let root = parse_particles(source);
        assert_eq!(root.children_to_string(), source);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        let root = parse_particles("a\n\nb");
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1].line, "");
    }
}
