/// One physical line of source, split into its indentation depth and content.
///
/// Indentation is counted in single spaces: each leading space is one level.
#[derive(Debug, PartialEq, Clone)]
pub struct LineToken {
    /// Number of leading spaces.
    pub depth: usize,
    /// The line with its indentation removed (and any trailing `\r` dropped).
    pub text: String,
    /// 1-based line number in the source.
    pub line_number: usize,
    /// Byte offset where `text` starts.
    pub pos_start: usize,
    /// Byte offset one past the end of `text`.
    pub pos_end: usize,
}

impl LineToken {
    pub fn new(depth: usize, text: String, line_number: usize, pos_start: usize) -> LineToken {
        let pos_end = pos_start + text.len();
        LineToken {
            depth,
            text,
            line_number,
            pos_start,
            pos_end,
        }
    }
}

/// Splits indentation-structured text into [`LineToken`]s.
///
/// An empty input produces no tokens; a trailing newline produces a final blank line,
/// so that `text` and the token stream always round-trip.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line_number: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line_number: 0,
            done: input.is_empty(),
        }
    }

    pub fn lex(&mut self) -> Vec<LineToken> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<LineToken> {
        if self.done {
            return None;
        }
        let rest = &self.input[self.position..];
        let (raw, consumed) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], idx + 1),
            None => {
                self.done = true;
                (rest, rest.len())
            }
        };
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let depth = raw.len() - raw.trim_start_matches(' ').len();

        self.line_number += 1;
        let token = LineToken::new(
            depth,
            raw[depth..].to_string(),
            self.line_number,
            self.position + depth,
        );
        self.position += consumed;
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<(usize, String)> {
        Lexer::new(input)
            .lex()
            .into_iter()
            .map(|t| (t.depth, t.text))
            .collect()
    }

    #[test]
    fn test_empty_input_has_no_lines() {
        assert!(Lexer::new("").lex().is_empty());
    }

    #[test]
    fn test_depths_and_text() {
        assert_eq!(
            texts("a\n b c\n  d"),
            vec![
                (0, "a".to_string()),
                (1, "b c".to_string()),
                (2, "d".to_string())
            ]
        );
    }

    #[test]
    fn test_trailing_newline_yields_blank_line() {
        assert_eq!(texts("a\n"), vec![(0, "a".to_string()), (0, String::new())]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        assert_eq!(texts("a\r\nb"), vec![(0, "a".to_string()), (0, "b".to_string())]);
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("ab\n cd").lex();
        assert_eq!(tokens[1].line_number, 2);
        assert_eq!(tokens[1].pos_start, 4);
        assert_eq!(tokens[1].pos_end, 6);
    }
}
