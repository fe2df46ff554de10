//! Parser for the textual query form.
//!
//! A single recursive-descent pass over the source, with no separate lexer:
//! each grammar function reads characters directly and skips whitespace
//! (space, tab, CR, LF) between tokens. Whitespace stays significant inside
//! string and regex literals.
//!
//! Precedence, loosest to tightest: `|` (pipe), `or`, `and`, the comparison
//! tier (`==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `not in`, and user
//! operators), `+`/`-`, `*`/`/`/`%`, `^` (right-associative), unary `-` and
//! `not`, then primary forms. All binary operators are left-associative
//! except `^`.
//!
//! Failures carry a byte offset and an expectation message; there is no
//! recovery, and trailing input after a complete expression is an error.

use crate::ast::Ast;
use crate::compile::Options;
use crate::value::Value;

/// Errors produced while parsing text into an AST.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Byte offset into the source where parsing failed
    pub offset: usize,
    /// What the parser expected at that point
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Binary operator precedence tiers, loosest first. The pipe sits above
/// this ladder and is handled structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum OpTier {
    Or,
    And,
    Comparison,
    Additive,
    Multiplicative,
    Power,
}

/// The built-in operator table: symbol, canonical function name, tier.
/// Longer symbols must precede their prefixes within a tier.
pub(crate) const CORE_OPERATORS: &[(&str, &str, OpTier)] = &[
    ("or", "or", OpTier::Or),
    ("and", "and", OpTier::And),
    ("==", "eq", OpTier::Comparison),
    ("!=", "ne", OpTier::Comparison),
    ("<=", "lte", OpTier::Comparison),
    ("<", "lt", OpTier::Comparison),
    (">=", "gte", OpTier::Comparison),
    (">", "gt", OpTier::Comparison),
    ("not in", "not in", OpTier::Comparison),
    ("in", "in", OpTier::Comparison),
    ("+", "add", OpTier::Additive),
    ("-", "subtract", OpTier::Additive),
    ("*", "multiply", OpTier::Multiplicative),
    ("/", "divide", OpTier::Multiplicative),
    ("%", "mod", OpTier::Multiplicative),
    ("^", "pow", OpTier::Power),
];

/// Tier for a user operator symbol: a symbol whose canonical function
/// already backs a core operator inherits that operator's tier, everything
/// else parses at the comparison tier.
pub(crate) fn tier_for_name(name: &str) -> OpTier {
    CORE_OPERATORS
        .iter()
        .find(|(_, canonical, _)| *canonical == name)
        .map(|(_, _, tier)| *tier)
        .unwrap_or(OpTier::Comparison)
}

struct OpEntry {
    symbol: String,
    name: String,
    tier: OpTier,
}

pub struct Parser<'a> {
    source: &'a str,
    pos: usize,
    operators: Vec<OpEntry>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, options: &Options) -> Self {
        let mut operators: Vec<OpEntry> = CORE_OPERATORS
            .iter()
            .map(|(symbol, name, tier)| OpEntry {
                symbol: symbol.to_string(),
                name: name.to_string(),
                tier: *tier,
            })
            .collect();
        for (symbol, name) in &options.operators {
            operators.push(OpEntry {
                symbol: symbol.clone(),
                name: name.clone(),
                tier: tier_for_name(name),
            });
        }
        // Longest-match within each tier
        operators.sort_by(|a, b| b.symbol.len().cmp(&a.symbol.len()));
        Parser {
            source,
            pos: 0,
            operators,
        }
    }

    /// Parse a complete query; trailing input is an error.
    pub fn parse(&mut self) -> Result<Ast, ParseError> {
        let ast = self.parse_pipe()?;
        self.skip_whitespace();
        if self.pos < self.source.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(ast)
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn error_at(&self, offset: usize, message: &str) -> ParseError {
        ParseError {
            offset,
            message: message.to_string(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.eat(ch) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch)))
        }
    }

    fn is_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
    }

    fn read_identifier(&mut self) -> Option<String> {
        match self.current_char() {
            Some(ch) if Self::is_ident_start(ch) => {}
            _ => return None,
        }
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if Self::is_ident_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        Some(self.source[start..self.pos].to_string())
    }

    /// Try to match a literal symbol at the current position.
    ///
    /// Word symbols require a non-identifier character after them, so `in`
    /// does not match inside `index`. Multi-word symbols (`not in`) allow
    /// whitespace between their words.
    fn match_symbol(&mut self, symbol: &str) -> bool {
        let mut pos = self.pos;
        for (i, word) in symbol.split(' ').enumerate() {
            if i > 0 {
                while let Some(ch) = self.source[pos..].chars().next() {
                    if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                        pos += ch.len_utf8();
                    } else {
                        break;
                    }
                }
            }
            if !self.source[pos..].starts_with(word) {
                return false;
            }
            pos += word.len();
            let word_like = word.chars().next_back().is_some_and(Self::is_ident_char);
            if word_like
                && self.source[pos..]
                    .chars()
                    .next()
                    .is_some_and(Self::is_ident_char)
            {
                return false;
            }
        }
        self.pos = pos;
        true
    }

    /// Match any operator of the given tier, returning its canonical
    /// function name.
    fn match_operator(&mut self, tier: OpTier) -> Option<String> {
        for i in 0..self.operators.len() {
            if self.operators[i].tier != tier {
                continue;
            }
            let symbol = self.operators[i].symbol.clone();
            if self.match_symbol(&symbol) {
                return Some(self.operators[i].name.clone());
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Grammar, loosest binding first

    fn parse_pipe(&mut self) -> Result<Ast, ParseError> {
        let mut parts = vec![self.parse_binary(OpTier::Or)?];
        loop {
            self.skip_whitespace();
            if self.eat('|') {
                parts.push(self.parse_binary(OpTier::Or)?);
            } else {
                break;
            }
        }
        if parts.len() == 1 {
            Ok(parts.swap_remove(0))
        } else {
            Ok(Ast::Pipe(parts))
        }
    }

    fn parse_binary(&mut self, tier: OpTier) -> Result<Ast, ParseError> {
        if tier == OpTier::Power {
            let left = self.parse_unary()?;
            self.skip_whitespace();
            if let Some(name) = self.match_operator(OpTier::Power) {
                // Right-associative
                let right = self.parse_binary(OpTier::Power)?;
                return Ok(Ast::Function(name, vec![left, right]));
            }
            return Ok(left);
        }
        let next = match tier {
            OpTier::Or => OpTier::And,
            OpTier::And => OpTier::Comparison,
            OpTier::Comparison => OpTier::Additive,
            OpTier::Additive => OpTier::Multiplicative,
            _ => OpTier::Power,
        };
        let mut left = self.parse_binary(next)?;
        loop {
            self.skip_whitespace();
            match self.match_operator(tier) {
                Some(name) => {
                    let right = self.parse_binary(next)?;
                    left = Ast::Function(name, vec![left, right]);
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        self.skip_whitespace();
        if self.eat('-') {
            let operand = self.parse_unary()?;
            // A negated number literal folds into the literal itself
            return Ok(match operand {
                Ast::Literal(Value::Number(n)) => Ast::Literal(Value::Number(-n)),
                other => Ast::Function(
                    "subtract".to_string(),
                    vec![Ast::Literal(Value::Number(0.0)), other],
                ),
            });
        }
        if self.match_symbol("not") {
            let operand = self.parse_unary()?;
            return Ok(Ast::Function("not".to_string(), vec![operand]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        self.skip_whitespace();
        match self.current_char() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => {
                self.advance();
                let expr = self.parse_pipe()?;
                self.expect(')')?;
                Ok(expr)
            }
            Some('{') => self.parse_object_literal(),
            Some('[') => self.parse_array_literal(),
            Some('"') => Ok(Ast::Literal(Value::String(self.parse_string_literal()?))),
            Some('/') => self.parse_regex_literal(),
            Some('.') => {
                self.advance();
                self.parse_property_chain(Vec::new())
            }
            Some(ch) if ch.is_ascii_digit() => self.parse_number_literal(),
            Some(ch) if Self::is_ident_start(ch) => {
                let name = match self.read_identifier() {
                    Some(name) => name,
                    None => return Err(self.error("expected an identifier")),
                };
                match name.as_str() {
                    "true" => return Ok(Ast::Literal(Value::Bool(true))),
                    "false" => return Ok(Ast::Literal(Value::Bool(false))),
                    "null" => return Ok(Ast::Literal(Value::Null)),
                    _ => {}
                }
                // A name followed immediately by '(' is a call, otherwise
                // it starts a property chain
                if self.current_char() == Some('(') {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Ast::Function(name, args))
                } else {
                    self.parse_property_chain(vec![Ast::Literal(Value::String(name))])
                }
            }
            Some(ch) => Err(self.error(&format!("unexpected character '{}'", ch))),
        }
    }

    /// Continue a property chain. `keys` holds the segments read so far;
    /// the leading `.` of the next segment (if the chain started with one)
    /// has already been consumed by the caller exactly once, so this first
    /// checks for a segment, then loops on further dots.
    fn parse_property_chain(&mut self, mut keys: Vec<Ast>) -> Result<Ast, ParseError> {
        // Chain opened by a bare '.': a segment may follow directly. A lone
        // '.' is the identity path get().
        if keys.is_empty() {
            if let Some(key) = self.parse_property_segment()? {
                keys.push(key);
            } else {
                return Ok(Ast::Function("get".to_string(), keys));
            }
        }
        loop {
            self.skip_whitespace();
            if !self.eat('.') {
                break;
            }
            match self.parse_property_segment()? {
                Some(key) => keys.push(key),
                None => return Err(self.error("expected property name after '.'")),
            }
        }
        Ok(Ast::Function("get".to_string(), keys))
    }

    fn parse_property_segment(&mut self) -> Result<Option<Ast>, ParseError> {
        self.skip_whitespace();
        match self.current_char() {
            Some('"') => Ok(Some(Ast::Literal(Value::String(
                self.parse_string_literal()?,
            )))),
            Some(ch) if Self::is_ident_start(ch) => {
                match self.read_identifier() {
                    Some(name) => Ok(Some(Ast::Literal(Value::String(name)))),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_pipe()?);
            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            if self.eat(')') {
                return Ok(args);
            }
            return Err(self.error("expected ',' or ')'"));
        }
    }

    fn parse_object_literal(&mut self) -> Result<Ast, ParseError> {
        self.advance(); // consume '{'
        let mut pairs = Vec::new();
        self.skip_whitespace();
        if self.eat('}') {
            return Ok(Ast::Object(pairs));
        }
        loop {
            self.skip_whitespace();
            let key = match self.current_char() {
                Some('"') => self.parse_string_literal()?,
                Some(ch) if Self::is_ident_start(ch) => match self.read_identifier() {
                    Some(name) => name,
                    None => return Err(self.error("expected object key")),
                },
                _ => return Err(self.error("expected object key")),
            };
            self.expect(':')?;
            let value = self.parse_pipe()?;
            pairs.push((key, value));
            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Ok(Ast::Object(pairs));
            }
            return Err(self.error("expected ',' or '}'"));
        }
    }

    fn parse_array_literal(&mut self) -> Result<Ast, ParseError> {
        self.advance(); // consume '['
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.eat(']') {
            return Ok(Ast::Array(items));
        }
        loop {
            items.push(self.parse_pipe()?);
            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Ok(Ast::Array(items));
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    fn parse_string_literal(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.advance(); // consume opening quote
        let mut result = String::new();
        loop {
            match self.current_char() {
                None => return Err(self.error_at(start, "unterminated string")),
                Some('"') => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    let escape_pos = self.pos;
                    match self.current_char() {
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('u') => {
                            self.advance();
                            result.push(self.parse_unicode_escape(escape_pos)?);
                            continue;
                        }
                        Some(ch) => {
                            return Err(
                                self.error_at(escape_pos, &format!("invalid escape '\\{}'", ch))
                            );
                        }
                        None => return Err(self.error_at(start, "unterminated string")),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    // The 'u' has been consumed; reads XXXX, plus a low-surrogate partner
    // when the first unit is a high surrogate.
    fn parse_unicode_escape(&mut self, escape_pos: usize) -> Result<char, ParseError> {
        let first = self.parse_hex4(escape_pos)?;
        let code = if (0xD800..=0xDBFF).contains(&first) {
            if !(self.eat('\\') && self.eat('u')) {
                return Err(self.error_at(escape_pos, "unpaired surrogate escape"));
            }
            let second = self.parse_hex4(escape_pos)?;
            if !(0xDC00..=0xDFFF).contains(&second) {
                return Err(self.error_at(escape_pos, "unpaired surrogate escape"));
            }
            0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
        } else {
            first
        };
        char::from_u32(code).ok_or_else(|| self.error_at(escape_pos, "invalid unicode escape"))
    }

    fn parse_hex4(&mut self, escape_pos: usize) -> Result<u32, ParseError> {
        let mut code: u32 = 0;
        for _ in 0..4 {
            let digit = match self.current_char().and_then(|c| c.to_digit(16)) {
                Some(d) => d,
                None => return Err(self.error_at(escape_pos, "invalid unicode escape")),
            };
            code = code * 16 + digit;
            self.advance();
        }
        Ok(code)
    }

    fn parse_number_literal(&mut self) -> Result<Ast, ParseError> {
        let start = self.pos;
        // Integer part: a single 0, or a nonzero digit run
        if self.eat('0') {
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error_at(start, "leading zeros are not allowed"));
            }
        } else {
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        // Fraction, only when a digit follows the dot
        if self.current_char() == Some('.')
            && self.rest()[1..].chars().next().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        // Exponent
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let mark = self.pos;
            self.advance();
            if matches!(self.current_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = mark;
            }
        }
        match self.source[start..self.pos].parse::<f64>() {
            Ok(n) => Ok(Ast::Literal(Value::Number(n))),
            Err(_) => Err(self.error_at(start, "invalid number")),
        }
    }

    /// A regex literal `/pattern/flags` lowers to a match-the-input
    /// predicate: `regex(get(), pattern, flags)`.
    fn parse_regex_literal(&mut self) -> Result<Ast, ParseError> {
        let start = self.pos;
        self.advance(); // consume '/'
        let mut pattern = String::new();
        loop {
            match self.current_char() {
                None => return Err(self.error_at(start, "unterminated regex")),
                Some('/') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    pattern.push('\\');
                    self.advance();
                    match self.current_char() {
                        Some(ch) => {
                            pattern.push(ch);
                            self.advance();
                        }
                        None => return Err(self.error_at(start, "unterminated regex")),
                    }
                }
                Some(ch) => {
                    pattern.push(ch);
                    self.advance();
                }
            }
        }
        let mut flags = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphabetic() {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let mut args = vec![
            Ast::Function("get".to_string(), Vec::new()),
            Ast::Literal(Value::String(pattern)),
        ];
        if !flags.is_empty() {
            args.push(Ast::Literal(Value::String(flags)));
        }
        Ok(Ast::Function("regex".to_string(), args))
    }
}

#[test]
fn test_keywords_parse_as_literals() {
    let mut parser = Parser::new("true", &Options::default());
    assert_eq!(parser.parse().unwrap(), Ast::Literal(Value::Bool(true)));
    let mut parser = Parser::new("null", &Options::default());
    assert_eq!(parser.parse().unwrap(), Ast::Literal(Value::Null));
}

#[test]
fn test_error_carries_byte_offset() {
    let mut parser = Parser::new(".name %", &Options::default());
    let err = parser.parse().unwrap_err();
    assert_eq!(err.offset, 7);
}
