use thiserror::Error;

/// Errors produced while lexing/parsing a boolean search query.
///
/// These are surfaced to the user verbatim, so the messages name the
/// offending construct in plain language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("query is empty")]
    Empty,
    #[error("unterminated quoted phrase")]
    UnterminatedPhrase,
    #[error("unexpected character `{0}` in query")]
    UnexpectedChar(char),
    #[error("missing closing parenthesis")]
    UnclosedParen,
    #[error("unexpected closing parenthesis")]
    UnexpectedCloseParen,
    #[error("expected a term, quoted phrase, NOT, or `(`, but the query ended")]
    UnexpectedEnd,
    #[error("operator `{0}` is not allowed here; expected a term, quoted phrase, NOT, or `(`")]
    MisplacedOperator(&'static str),
    #[error("unexpected `{0}` after a complete expression (missing AND/OR?)")]
    TrailingInput(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Term(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Term(t) => t.clone(),
            Token::Not => "NOT".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

/// Boolean query expression over substring terms.
///
/// Built once per query string and reused across all posts; evaluation is
/// a pure function of (expression, target text).
///
/// Precedence, highest to lowest binding: `NOT` > `AND` > `OR`.
/// Runs of the same operator flatten into one n-ary node, so
/// `a AND b AND c` is a single `And` with three children rather than a
/// nested pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Leaf term, matched by case-insensitive substring containment.
    Term(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Parse a query string like `hydration AND (bottle OR flask) NOT broken`.
    ///
    /// Bare terms are maximal runs of alphanumerics, `_`, and `-`. Quoted
    /// phrases keep their content verbatim (spaces included) as a single
    /// term. `NOT`/`AND`/`OR` are case-insensitive keywords, recognized
    /// only as standalone words outside quotes.
    pub fn parse(query: &str) -> Result<Expr, ParseError> {
        let tokens = lex(query)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(ParseError::TrailingInput(tok.describe()));
        }
        Ok(expr)
    }

    /// True iff `text` satisfies this expression.
    ///
    /// Terms match by case-insensitive substring containment; no stemming,
    /// tokenization, or punctuation stripping is applied.
    pub fn matches(&self, text: &str) -> bool {
        self.eval(&text.to_lowercase())
    }

    fn eval(&self, lowered: &str) -> bool {
        match self {
            Expr::Term(term) => lowered.contains(&term.to_lowercase()),
            Expr::Not(child) => !child.eval(lowered),
            Expr::And(children) => children.iter().all(|c| c.eval(lowered)),
            Expr::Or(children) => children.iter().any(|c| c.eval(lowered)),
        }
    }

    /// Terms that must (or may) be present for a match, i.e. every leaf
    /// not under a `NOT`. Used to build the keyword string for remote
    /// search, which has no boolean semantics of its own.
    pub fn positive_terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_positive(false, &mut out);
        out
    }

    fn collect_positive<'a>(&'a self, negated: bool, out: &mut Vec<&'a str>) {
        match self {
            Expr::Term(term) => {
                if !negated {
                    out.push(term.as_str());
                }
            }
            Expr::Not(child) => child.collect_positive(!negated, out),
            Expr::And(children) | Expr::Or(children) => {
                for c in children {
                    c.collect_positive(negated, out);
                }
            }
        }
    }
}

fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            chars.next();
            tokens.push(Token::LParen);
        } else if c == ')' {
            chars.next();
            tokens.push(Token::RParen);
        } else if c == '"' {
            chars.next();
            let mut phrase = String::new();
            let mut closed = false;
            for c2 in chars.by_ref() {
                if c2 == '"' {
                    closed = true;
                    break;
                }
                phrase.push(c2);
            }
            if !closed {
                return Err(ParseError::UnterminatedPhrase);
            }
            tokens.push(Token::Term(phrase));
        } else if is_term_char(c) {
            let mut word = String::new();
            while let Some(&c2) = chars.peek() {
                if !is_term_char(c2) {
                    break;
                }
                word.push(c2);
                chars.next();
            }
            // Keywords only when the whole word matches, so `android`
            // or `nota-bene` stay ordinary terms.
            match word.to_ascii_uppercase().as_str() {
                "NOT" => tokens.push(Token::Not),
                "AND" => tokens.push(Token::And),
                "OR" => tokens.push(Token::Or),
                _ => tokens.push(Token::Term(word)),
            }
        } else {
            return Err(ParseError::UnexpectedChar(c));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut children = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            children.push(self.parse_and()?);
        }
        Ok(if children.len() == 1 {
            children.pop().expect("one child")
        } else {
            Expr::Or(children)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut children = vec![self.parse_not()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.bump();
                    children.push(self.parse_not()?);
                }
                // Exclusions may be written without an explicit AND:
                // `a NOT b` reads as `a AND NOT b`.
                Some(Token::Not) => {
                    children.push(self.parse_not()?);
                }
                _ => break,
            }
        }
        Ok(if children.len() == 1 {
            children.pop().expect("one child")
        } else {
            Expr::And(children)
        })
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            Ok(Expr::Not(Box::new(self.parse_not()?)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(Token::Term(term)) => Ok(Expr::Term(term)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ParseError::UnclosedParen),
                }
            }
            Some(Token::RParen) => Err(ParseError::UnexpectedCloseParen),
            Some(Token::And) => Err(ParseError::MisplacedOperator("AND")),
            Some(Token::Or) => Err(ParseError::MisplacedOperator("OR")),
            Some(Token::Not) => Err(ParseError::MisplacedOperator("NOT")),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}
