//! Nginx configuration parser
//!
//! A small recursive-descent parser for the subset of Nginx's configuration
//! grammar the deployer and vhost-view logic touch: directives terminated
//! by `;`, blocks delimited by `{`/`}`, `#` line comments, and single- or
//! double-quoted arguments. It does not attempt full grammar coverage
//! (e.g. `map` blocks with embedded regex bodies) — only what a `server`
//! or `location` block needs.

use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, Dialect, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    OpenBrace,
    CloseBrace,
    Semicolon,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' => {
                chars.next();
                tokens.push(Token::OpenBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::CloseBrace);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semicolon);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut word = String::new();
                let mut closed = false;
                while let Some(&c) = chars.peek() {
                    chars.next();
                    if c == '\\' {
                        if let Some(&next) = chars.peek() {
                            word.push(next);
                            chars.next();
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
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == ';' || c == '#' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
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

    fn parse_block_children(&mut self, terminator: Option<&Token>) -> Result<Vec<usize>> {
        let mut children = Vec::new();

        loop {
            match self.peek() {
                None => break,
                Some(t) if Some(t) == terminator => {
                    self.next();
                    break;
                }
                _ => {
                    let id = self.parse_statement()?;
                    children.push(id);
                }
            }
        }

        Ok(children)
    }

    fn parse_statement(&mut self) -> Result<usize> {
        let mut words = Vec::new();
        loop {
            match self.next() {
                Some(Token::Word(w)) => words.push(w),
                Some(Token::Semicolon) => {
                    let (name, args) = split_name_args(words)?;
                    return Ok(self.ast.alloc(Node::Directive {
                        name,
                        args,
                        comment: None,
                    }));
                }
                Some(Token::OpenBrace) => {
                    let (name, args) = split_name_args(words)?;
                    let children = self.parse_block_children(Some(&Token::CloseBrace))?;
                    let id = self.ast.alloc(Node::Block {
                        name,
                        args,
                        children: Vec::new(),
                        comment: None,
                    });
                    if let Node::Block { children: c, .. } = self.ast.node_mut(id) {
                        *c = children;
                    }
                    return Ok(id);
                }
                Some(Token::CloseBrace) => {
                    return Err(CoreError::config_parse("unexpected '}'"));
                }
                None => {
                    return Err(CoreError::config_parse(
                        "unexpected end of file inside statement",
                    ));
                }
            }
        }
    }
}

fn split_name_args(mut words: Vec<String>) -> Result<(String, Vec<String>)> {
    if words.is_empty() {
        return Err(CoreError::config_parse("empty directive"));
    }
    let name = words.remove(0);
    Ok((name, words))
}

/// Parse raw Nginx configuration text into an [`Ast`].
pub fn parse(input: &str) -> Result<Ast> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        ast: Ast::new(Dialect::Nginx),
    };
    let top_level = parser.parse_block_children(None)?;
    parser.ast.top_level = top_level;
    Ok(parser.ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ast::Node;

    #[test]
    fn parses_a_simple_server_block() {
        let input = r#"
            server {
                listen 80;
                server_name example.com www.example.com;
                location / {
                    root /var/www/html;
                }
            }
        "#;

        let ast = parse(input).unwrap();
        let servers = ast.find_blocks("server");
        assert_eq!(servers.len(), 1);

        let server = servers[0];
        let listens = ast.find_directives(server, "listen");
        assert_eq!(listens.len(), 1);
        assert_eq!(ast.node(listens[0]).args(), &["80".to_string()]);

        let locations = ast.find_blocks("location");
        assert_eq!(locations.len(), 1);
        assert_eq!(ast.node(locations[0]).args(), &["/".to_string()]);
    }

    #[test]
    fn handles_quoted_arguments_and_comments() {
        let input = r#"
            # a top-level comment
            server {
                default_type "text/plain";
            }
        "#;
        let ast = parse(input).unwrap();
        let servers = ast.find_blocks("server");
        let dt = ast.find_directives(servers[0], "default_type");
        match ast.node(dt[0]) {
            Node::Directive { args, .. } => assert_eq!(args[0], "text/plain"),
            _ => panic!("expected directive"),
        }
    }

    #[test]
    fn rejects_unterminated_block() {
        let input = "server { listen 80;";
        assert!(parse(input).is_err());
    }
}
