//! Fragment and compilation-unit parsing.
//!
//! [`BraceParser`] understands the statement structure shared by brace and
//! semicolon languages (Java, C, C#, ...). It does not check expressions; it
//! only needs to know where statements start and end, which is all the search
//! addresses.

use crate::node::Statement;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced `{delimiter}` at byte {offset}")]
    Unbalanced { delimiter: char, offset: usize },

    #[error("unterminated literal or comment starting at byte {offset}")]
    Unterminated { offset: usize },

    #[error("text without a statement terminator: {text:?}")]
    Trailing { text: String },

    #[error("fragment contains no statements")]
    Empty,
}

/// Turns program text into statements.
pub trait StatementParser: Send + Sync {
    /// Parse a whole compilation unit into its top-level items.
    fn parse_unit(&self, text: &str) -> Result<Vec<Statement>, ParseError>;

    /// Parse a fragment that must occupy a single statement position.
    ///
    /// Several statements are wrapped in a bare block.
    fn parse_statement(&self, text: &str) -> Result<Statement, ParseError> {
        let mut items = self.parse_unit(text)?;
        match items.len() {
            0 => Err(ParseError::Empty),
            1 => Ok(items.remove(0)),
            _ => Ok(Statement::block("", items)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BraceParser;

impl BraceParser {
    pub fn new() -> Self {
        Self
    }
}

impl StatementParser for BraceParser {
    fn parse_unit(&self, text: &str) -> Result<Vec<Statement>, ParseError> {
        Scanner::new(text).run()
    }
}

struct Frame {
    header: String,
    body: Vec<Statement>,
    opened_at: usize,
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<Frame>,
    current: String,
    /// Open `(` and `[` outside literals.
    parens: Vec<(char, usize)>,
    /// Braces that belong to an expression (array initializers, lambdas).
    expr_braces: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            stack: vec![Frame {
                header: String::new(),
                body: Vec::new(),
                opened_at: 0,
            }],
            current: String::new(),
            parens: Vec::new(),
            expr_braces: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Statement>, ParseError> {
        while let Some(c) = self.peek_char() {
            match c {
                '"' | '\'' => self.literal(c)?,
                '/' if self.lookahead(1) == Some(b'/') => self.line_comment(),
                '/' if self.lookahead(1) == Some(b'*') => self.block_comment()?,
                '(' | '[' => {
                    self.parens.push((c, self.pos));
                    self.push_char(c);
                }
                ')' | ']' => {
                    let expected = if c == ')' { '(' } else { '[' };
                    match self.parens.pop() {
                        Some((open, _)) if open == expected => self.push_char(c),
                        _ => {
                            return Err(ParseError::Unbalanced {
                                delimiter: c,
                                offset: self.pos,
                            })
                        }
                    }
                }
                '{' => {
                    if self.in_expression() {
                        self.expr_braces += 1;
                        self.push_char(c);
                    } else {
                        let header = std::mem::take(&mut self.current).trim().to_string();
                        self.stack.push(Frame {
                            header,
                            body: Vec::new(),
                            opened_at: self.pos,
                        });
                        self.pos += 1;
                    }
                }
                '}' => {
                    if self.expr_braces > 0 {
                        self.expr_braces -= 1;
                        self.push_char(c);
                    } else {
                        self.close_block()?;
                    }
                }
                ';' if self.parens.is_empty() && self.expr_braces == 0 => {
                    self.push_char(';');
                    let text = std::mem::take(&mut self.current).trim().to_string();
                    self.top().body.push(Statement::Simple(text));
                }
                c if c.is_whitespace() => {
                    if !self.current.is_empty() && !self.current.ends_with(' ') {
                        self.current.push(' ');
                    }
                    self.pos += c.len_utf8();
                }
                _ => self.push_char(c),
            }
        }

        if let Some((delimiter, offset)) = self.parens.pop() {
            return Err(ParseError::Unbalanced { delimiter, offset });
        }
        if self.expr_braces > 0 || self.stack.len() > 1 {
            let offset = self.stack.last().map(|f| f.opened_at).unwrap_or(self.pos);
            return Err(ParseError::Unbalanced {
                delimiter: '{',
                offset,
            });
        }
        self.ensure_no_trailing()?;

        Ok(self.stack.pop().map(|frame| frame.body).unwrap_or_default())
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn lookahead(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn push_char(&mut self, c: char) {
        self.current.push(c);
        self.pos += c.len_utf8();
    }

    /// A `{` continues an expression after `=`, `->`, `]`, `,` or `return`,
    /// or anywhere inside parentheses.
    fn in_expression(&self) -> bool {
        if !self.parens.is_empty() || self.expr_braces > 0 {
            return true;
        }
        let head = self.current.trim_end();
        head.ends_with('=')
            || head.ends_with("->")
            || head.ends_with(']')
            || head.ends_with(',')
            || head == "return"
            || head.ends_with(" return")
    }

    fn close_block(&mut self) -> Result<(), ParseError> {
        if self.stack.len() == 1 {
            return Err(ParseError::Unbalanced {
                delimiter: '}',
                offset: self.pos,
            });
        }
        self.ensure_no_trailing()?;
        self.pos += 1;
        if let Some(frame) = self.stack.pop() {
            self.top().body.push(Statement::Block {
                header: frame.header,
                body: frame.body,
            });
        }
        Ok(())
    }

    fn ensure_no_trailing(&self) -> Result<(), ParseError> {
        let text = self.current.trim();
        if text.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Trailing {
                text: text.to_string(),
            })
        }
    }

    fn literal(&mut self, quote: char) -> Result<(), ParseError> {
        let start = self.pos;
        if quote == '"' && self.src[self.pos..].starts_with("\"\"\"") {
            return self.text_block(start);
        }
        self.push_char(quote);
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.push_char(c);
                    match self.peek_char() {
                        Some(escaped) if escaped != '\n' => self.push_char(escaped),
                        _ => return Err(ParseError::Unterminated { offset: start }),
                    }
                }
                '\n' => break,
                c if c == quote => {
                    self.push_char(c);
                    return Ok(());
                }
                _ => self.push_char(c),
            }
        }
        Err(ParseError::Unterminated { offset: start })
    }

    fn text_block(&mut self, start: usize) -> Result<(), ParseError> {
        let body_start = start + 3;
        match self.src[body_start..].find("\"\"\"") {
            Some(end) => {
                let stop = body_start + end + 3;
                self.current.push_str(&self.src[start..stop]);
                self.pos = stop;
                Ok(())
            }
            None => Err(ParseError::Unterminated { offset: start }),
        }
    }

    fn line_comment(&mut self) {
        match self.src[self.pos..].find('\n') {
            Some(end) => self.pos += end,
            None => self.pos = self.src.len(),
        }
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        match self.src[start + 2..].find("*/") {
            Some(end) => {
                self.pos = start + 2 + end + 2;
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
                Ok(())
            }
            None => Err(ParseError::Unterminated { offset: start }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_statements() {
        let items = BraceParser.parse_unit("int x = 1;\n  x   += 2;").unwrap();
        assert_eq!(
            items,
            vec![Statement::simple("int x = 1;"), Statement::simple("x += 2;")]
        );
    }

    #[test]
    fn test_parse_nested_blocks() {
        let src = "for (int i = 0; i < n; i++) { if (a[i] > 0) { sum += a[i]; } }";
        let stmt = BraceParser.parse_statement(src).unwrap();
        assert_eq!(
            stmt,
            Statement::block(
                "for (int i = 0; i < n; i++)",
                vec![Statement::block(
                    "if (a[i] > 0)",
                    vec![Statement::simple("sum += a[i];")]
                )]
            )
        );
    }

    #[test]
    fn test_multiple_statements_wrap_in_block() {
        let stmt = BraceParser.parse_statement("a++; b++;").unwrap();
        assert_eq!(
            stmt,
            Statement::block("", vec![Statement::simple("a++;"), Statement::simple("b++;")])
        );
    }

    #[test]
    fn test_array_initializer_and_lambda_stay_in_statement() {
        let items = BraceParser
            .parse_unit("int[] xs = {1, 2, 3}; run(() -> { go(); });")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Statement::simple("int[] xs = {1, 2, 3};"));
        assert_eq!(items[1], Statement::simple("run(() -> { go(); });"));
    }

    #[test]
    fn test_literals_and_comments() {
        let items = BraceParser
            .parse_unit("s = \"a;{b}\"; // trailing; comment\nc = '}'; /* { */ d();")
            .unwrap();
        assert_eq!(
            items,
            vec![
                Statement::simple("s = \"a;{b}\";"),
                Statement::simple("c = '}';"),
                Statement::simple("d();"),
            ]
        );
    }

    #[test]
    fn test_rejects_prose_and_unbalanced_input() {
        assert!(matches!(
            BraceParser.parse_statement("Here is a faster version"),
            Err(ParseError::Trailing { .. })
        ));
        assert!(matches!(
            BraceParser.parse_statement("if (x) { y();"),
            Err(ParseError::Unbalanced { delimiter: '{', .. })
        ));
        assert!(matches!(
            BraceParser.parse_statement("y());"),
            Err(ParseError::Unbalanced { delimiter: ')', .. })
        ));
        assert!(matches!(
            BraceParser.parse_statement("s = \"open;"),
            Err(ParseError::Unterminated { .. })
        ));
        assert_eq!(BraceParser.parse_statement("  // nothing\n"), Err(ParseError::Empty));
    }
}
