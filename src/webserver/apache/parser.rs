//! Apache configuration parser
//!
//! A recursive-descent parser for the subset of Apache's configuration
//! grammar the deployer and vhost-view logic touch: bare-line directives
//! (terminated by newline, unlike Nginx's `;`), `<Tag arg...>...</Tag>`
//! blocks, `#` line comments, and quoted arguments.

use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, Dialect, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    /// `<Tag arg...>` — bool is true for a closing tag (`</Tag>`).
    TagOpen(String, Vec<String>),
    TagClose(String),
    Newline,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            tokens.push(Token::Newline);
            continue;
        }

        if let Some(tag_body) = line.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            if let Some(name) = tag_body.strip_prefix('/') {
                tokens.push(Token::TagClose(name.trim().to_string()));
            } else {
                let words = split_words(tag_body)?;
                let mut iter = words.into_iter();
                let name = iter
                    .next()
                    .ok_or_else(|| CoreError::config_parse("empty tag"))?;
                tokens.push(Token::TagOpen(name, iter.collect()));
            }
            tokens.push(Token::Newline);
            continue;
        }

        let words = split_words(line)?;
        for w in words {
            tokens.push(Token::Word(w));
        }
        tokens.push(Token::Newline);
    }

    Ok(tokens)
}

/// Split a single logical line into words, honoring quoted arguments and
/// stripping a trailing `# comment`.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => break,
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut word = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        if let Some(next) = chars.next() {
                            word.push(next);
                        }
                        continue;
                    }
                    if c == quote {
                        closed = true;
                        break;
                    }
                    word.push(c);
                }
                if !closed {
                    return Err(CoreError::config_parse("unterminated quoted string"));
                }
                words.push(word);
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '#' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                words.push(word);
            }
        }
    }

    Ok(words)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    /// Parse statements until `closing_tag` is seen (consuming it), or EOF
    /// if `closing_tag` is `None` (top level).
    fn parse_block_children(&mut self, closing_tag: Option<&str>) -> Result<Vec<usize>> {
        let mut children = Vec::new();

        loop {
            match self.peek() {
                None => {
                    if closing_tag.is_some() {
                        return Err(CoreError::config_parse(
                            "unexpected end of file inside block",
                        ));
                    }
                    break;
                }
                Some(Token::Newline) => {
                    self.next();
                }
                Some(Token::TagClose(name)) => {
                    let name = name.clone();
                    match closing_tag {
                        Some(expected) if expected.eq_ignore_ascii_case(&name) => {
                            self.next();
                            break;
                        }
                        _ => {
                            return Err(CoreError::config_parse(format!(
                                "unexpected closing tag </{}>",
                                name
                            )));
                        }
                    }
                }
                Some(Token::TagOpen(..)) => {
                    let id = self.parse_block()?;
                    children.push(id);
                }
                Some(Token::Word(_)) => {
                    let id = self.parse_directive()?;
                    children.push(id);
                }
            }
        }

        Ok(children)
    }

    fn parse_block(&mut self) -> Result<usize> {
        let (name, args) = match self.next() {
            Some(Token::TagOpen(name, args)) => (name, args),
            _ => unreachable!("parse_block called without a TagOpen"),
        };

        let children = self.parse_block_children(Some(&name))?;
        let id = self.ast.alloc(Node::Block {
            name,
            args,
            children,
            comment: None,
        });
        Ok(id)
    }

    fn parse_directive(&mut self) -> Result<usize> {
        let mut words = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(w)) = self.next() {
                        words.push(w);
                    }
                }
                _ => break,
            }
        }
        // consume the trailing newline, if present
        if matches!(self.peek(), Some(Token::Newline)) {
            self.next();
        }

        if words.is_empty() {
            return Err(CoreError::config_parse("empty directive"));
        }
        let name = words.remove(0);
        Ok(self.ast.alloc(Node::Directive {
            name,
            args: words,
            comment: None,
        }))
    }
}

/// Parse raw Apache configuration text into an [`Ast`].
pub fn parse(input: &str) -> Result<Ast> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        ast: Ast::new(Dialect::Apache),
    };
    let top_level = parser.parse_block_children(None)?;
    parser.ast.top_level = top_level;
    Ok(parser.ast)
}
