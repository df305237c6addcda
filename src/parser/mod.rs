//! Recursive-descent parser for the shell language.
//!
//! Produces the [`crate::ast`] tree. The grammar is the practically-used
//! bash subset: pipelines, and-or lists, redirections (including
//! here-documents), all compound commands, function definitions, and the
//! full word syntax handled in [`word`].

pub mod arith;
pub mod cond;
pub mod word;

use crate::ast::*;
use std::fmt;

/// A syntax error. Reported once; the script never starts executing.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self { message: message.into(), line }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a complete script.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let mut parser = Parser::new(source);
    let statements = parser.parse_statements_until(None)?;
    parser.skip_separators();
    if !parser.at_end() {
        return Err(parser.error(format!(
            "syntax error near unexpected token `{}'",
            parser.peek().unwrap_or(' ')
        )));
    }
    Ok(Script { statements })
}

const RESERVED_LIST_STOPS: &[&str] = &[
    "then", "elif", "else", "fi", "do", "done", "esac", "}",
];

pub(crate) struct Parser {
    chars: Vec<char>,
    pos: usize,
    /// After a here-document operator, the body is consumed ahead of the
    /// cursor; this records where normal parsing resumes once the current
    /// line's newline is crossed.
    heredoc_resume: Option<usize>,
}

impl Parser {
    pub(crate) fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, heredoc_resume: None }
    }

    // -- cursor primitives --------------------------------------------------

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    pub(crate) fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    pub(crate) fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    pub(crate) fn line(&self) -> u32 {
        1 + self.chars[..self.pos.min(self.chars.len())]
            .iter()
            .filter(|&&c| c == '\n')
            .count() as u32
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line())
    }

    /// Skip spaces, tabs, comments, and backslash-newline continuations.
    pub(crate) fn skip_spaces(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.pos += 1;
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Consume a newline, jumping over any here-document bodies that were
    /// read ahead on this line.
    fn consume_newline(&mut self) {
        self.pos += 1;
        if let Some(resume) = self.heredoc_resume.take() {
            self.pos = resume;
        }
    }

    /// Skip statement separators: newlines and single `;` (never the `;;`
    /// family, which belongs to `case`).
    pub(crate) fn skip_separators(&mut self) {
        loop {
            self.skip_spaces();
            match self.peek() {
                Some('\n') => self.consume_newline(),
                Some(';') if self.peek_at(1) != Some(';') && self.peek_at(1) != Some('&') => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    /// Skip blank space and newlines (used after `|`, `&&`, `||`).
    fn skip_space_and_newlines(&mut self) {
        loop {
            self.skip_spaces();
            if self.peek() == Some('\n') {
                self.consume_newline();
            } else {
                break;
            }
        }
    }

    /// Look at the next whitespace-delimited token without consuming it.
    pub(crate) fn peek_token(&self) -> Option<String> {
        let mut i = self.pos;
        while let Some(&c) = self.chars.get(i) {
            if c == ' ' || c == '\t' {
                i += 1;
            } else {
                break;
            }
        }
        let mut token = String::new();
        while let Some(&c) = self.chars.get(i) {
            if c.is_whitespace() || "|&;<>()".contains(c) {
                break;
            }
            token.push(c);
            i += 1;
        }
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    fn eat_token(&mut self, expected: &str) -> bool {
        if self.peek_token().as_deref() == Some(expected) {
            self.skip_spaces();
            self.pos += expected.chars().count();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.eat_token(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected `{}', found `{}'",
                expected,
                self.peek_token().unwrap_or_default()
            )))
        }
    }

    // -- statements ---------------------------------------------------------

    /// Parse statements until end of input, a closing character (for
    /// subshells and command substitutions), or a reserved stop word.
    pub(crate) fn parse_statements_until(
        &mut self,
        close: Option<char>,
    ) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.at_end() {
                break;
            }
            if let Some(c) = close {
                if self.peek() == Some(c) {
                    break;
                }
            }
            if self.peek() == Some(')') {
                break;
            }
            if self.starts_with(";;") || self.starts_with(";&") {
                break;
            }
            if let Some(token) = self.peek_token() {
                if RESERVED_LIST_STOPS.contains(&token.as_str()) {
                    break;
                }
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();
        let mut background = false;
        loop {
            self.skip_spaces();
            if self.eat("&&") {
                self.skip_space_and_newlines();
                rest.push((AndOr::And, self.parse_pipeline()?));
            } else if self.eat("||") {
                self.skip_space_and_newlines();
                rest.push((AndOr::Or, self.parse_pipeline()?));
            } else if self.peek() == Some('&') && self.peek_at(1) != Some('>') {
                self.pos += 1;
                background = true;
                break;
            } else {
                break;
            }
        }
        Ok(Statement { first, rest, background })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        self.skip_spaces();
        let mut negated = false;
        while self.peek_token().as_deref() == Some("!") {
            self.eat_token("!");
            negated = !negated;
            self.skip_spaces();
        }
        let mut elements = vec![PipeElement {
            command: self.parse_command()?,
            stderr_piped: false,
        }];
        loop {
            self.skip_spaces();
            if self.peek() == Some('|') && self.peek_at(1) != Some('|') {
                self.pos += 1;
                let stderr_piped = self.peek() == Some('&');
                if stderr_piped {
                    self.pos += 1;
                }
                self.skip_space_and_newlines();
                elements.push(PipeElement { command: self.parse_command()?, stderr_piped });
            } else {
                break;
            }
        }
        Ok(Pipeline { negated, elements })
    }

    // -- commands -----------------------------------------------------------

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        self.skip_spaces();
        if self.starts_with("[[") {
            return self.parse_cond_command();
        }
        if self.starts_with("((") {
            return self.parse_arith_command();
        }
        if self.peek() == Some('(') {
            return self.parse_subshell();
        }
        match self.peek_token().as_deref() {
            Some("if") => self.parse_if(),
            Some("while") => self.parse_while(false),
            Some("until") => self.parse_while(true),
            Some("for") => self.parse_for(),
            Some("case") => self.parse_case(),
            Some("{") => self.parse_group(),
            Some("function") => self.parse_function_keyword(),
            _ => self.parse_simple_command(),
        }
    }

    fn parse_trailing_redirects(&mut self) -> Result<Vec<Redirect>, ParseError> {
        let mut redirects = Vec::new();
        loop {
            self.skip_spaces();
            if self.redirect_ahead() {
                redirects.push(self.parse_redirect()?);
            } else {
                break;
            }
        }
        Ok(redirects)
    }

    fn parse_if(&mut self) -> Result<Command, ParseError> {
        self.expect_token("if")?;
        let mut clauses = Vec::new();
        let cond = self.parse_statements_until(None)?;
        self.expect_token("then")?;
        let body = self.parse_statements_until(None)?;
        clauses.push((cond, body));
        let mut else_body = None;
        loop {
            if self.eat_token("elif") {
                let cond = self.parse_statements_until(None)?;
                self.expect_token("then")?;
                let body = self.parse_statements_until(None)?;
                clauses.push((cond, body));
            } else if self.eat_token("else") {
                else_body = Some(self.parse_statements_until(None)?);
            } else {
                break;
            }
        }
        self.expect_token("fi")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::If { clauses, else_body }, redirects))
    }

    fn parse_while(&mut self, until: bool) -> Result<Command, ParseError> {
        self.expect_token(if until { "until" } else { "while" })?;
        let cond = self.parse_statements_until(None)?;
        self.expect_token("do")?;
        let body = self.parse_statements_until(None)?;
        self.expect_token("done")?;
        let redirects = self.parse_trailing_redirects()?;
        let compound = if until {
            CompoundCommand::Until { cond, body }
        } else {
            CompoundCommand::While { cond, body }
        };
        Ok(Command::Compound(compound, redirects))
    }

    fn parse_for(&mut self) -> Result<Command, ParseError> {
        self.expect_token("for")?;
        self.skip_spaces();
        if self.starts_with("((") {
            self.pos += 2;
            let text = self.take_until_double_paren()?;
            let pieces: Vec<&str> = text.splitn(3, ';').collect();
            if pieces.len() != 3 {
                return Err(self.error("expected `(( init; cond; step ))'"));
            }
            let line = self.line();
            let parse_piece = |p: &str| -> Result<Option<ArithExpr>, ParseError> {
                let trimmed = p.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    arith::parse_arith(trimmed)
                        .map(Some)
                        .map_err(|m| ParseError::new(m, line))
                }
            };
            let init = parse_piece(pieces[0])?;
            let cond = parse_piece(pieces[1])?;
            let step = parse_piece(pieces[2])?;
            self.skip_separators();
            self.expect_token("do")?;
            let body = self.parse_statements_until(None)?;
            self.expect_token("done")?;
            let redirects = self.parse_trailing_redirects()?;
            return Ok(Command::Compound(
                CompoundCommand::ForArith { init, cond, step, body },
                redirects,
            ));
        }
        let var = match self.peek_token() {
            Some(name) if is_name(&name) => {
                self.eat_token(&name);
                name
            }
            other => {
                return Err(self.error(format!(
                    "bad for loop variable `{}'",
                    other.unwrap_or_default()
                )))
            }
        };
        self.skip_spaces();
        let words = if self.eat_token("in") {
            let mut words = Vec::new();
            loop {
                self.skip_spaces();
                match self.peek() {
                    None | Some('\n') | Some(';') => break,
                    _ => words.push(word::parse_word(self, word::WordMode::Normal)?),
                }
            }
            Some(words)
        } else {
            None
        };
        self.skip_separators();
        self.expect_token("do")?;
        let body = self.parse_statements_until(None)?;
        self.expect_token("done")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::For { var, words, body }, redirects))
    }

    fn parse_case(&mut self) -> Result<Command, ParseError> {
        self.expect_token("case")?;
        self.skip_spaces();
        let word = word::parse_word(self, word::WordMode::Normal)?;
        self.skip_separators();
        self.expect_token("in")?;
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            if self.peek_token().as_deref() == Some("esac") {
                break;
            }
            if self.at_end() {
                return Err(self.error("unexpected end of file looking for `esac'"));
            }
            self.skip_spaces();
            if self.peek() == Some('(') {
                self.pos += 1;
            }
            let mut patterns = Vec::new();
            loop {
                self.skip_spaces();
                patterns.push(word::parse_word(self, word::WordMode::CasePattern)?);
                self.skip_spaces();
                if self.peek() == Some('|') && self.peek_at(1) != Some('|') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            self.skip_spaces();
            if self.peek() != Some(')') {
                return Err(self.error("expected `)' after case pattern"));
            }
            self.pos += 1;
            let body = self.parse_statements_until(None)?;
            self.skip_spaces();
            let terminator = if self.eat(";;&") {
                CaseTerminator::Continue
            } else if self.eat(";;") {
                CaseTerminator::Break
            } else if self.eat(";&") {
                CaseTerminator::FallThrough
            } else {
                CaseTerminator::Break
            };
            items.push(CaseItem { patterns, body, terminator });
        }
        self.expect_token("esac")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Case { word, items }, redirects))
    }

    fn parse_group(&mut self) -> Result<Command, ParseError> {
        self.expect_token("{")?;
        let body = self.parse_statements_until(None)?;
        self.expect_token("}")?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Group(body), redirects))
    }

    fn parse_subshell(&mut self) -> Result<Command, ParseError> {
        self.pos += 1; // '('
        let body = self.parse_statements_until(Some(')'))?;
        self.skip_separators();
        if self.peek() != Some(')') {
            return Err(self.error("expected `)'"));
        }
        self.pos += 1;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Subshell(body), redirects))
    }

    fn parse_arith_command(&mut self) -> Result<Command, ParseError> {
        self.pos += 2; // '(('
        let text = self.take_until_double_paren()?;
        let expr = arith::parse_arith(&text).map_err(|m| self.error(m))?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Arith(expr), redirects))
    }

    fn parse_cond_command(&mut self) -> Result<Command, ParseError> {
        self.pos += 2; // '[['
        let expr = cond::parse_cond(self)?;
        let redirects = self.parse_trailing_redirects()?;
        Ok(Command::Compound(CompoundCommand::Cond(expr), redirects))
    }

    fn parse_function_keyword(&mut self) -> Result<Command, ParseError> {
        self.expect_token("function")?;
        let name = self
            .peek_token()
            .ok_or_else(|| self.error("expected function name"))?;
        self.eat_token(&name);
        self.skip_spaces();
        if self.eat("()") {
            self.skip_spaces();
        }
        self.skip_space_and_newlines();
        let body = self.parse_command()?;
        Ok(Command::FunctionDef(FunctionDef { name, body: Box::new(body) }))
    }

    /// Capture the text inside `(( ... ))`, honoring nested parentheses.
    fn take_until_double_paren(&mut self) -> Result<String, ParseError> {
        let mut depth = 0usize;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of file looking for `))'")),
                Some(')') if depth == 0 && self.peek_at(1) == Some(')') => {
                    self.pos += 2;
                    return Ok(text);
                }
                Some('(') => {
                    depth += 1;
                    text.push('(');
                    self.pos += 1;
                }
                Some(')') => {
                    depth = depth.saturating_sub(1);
                    text.push(')');
                    self.pos += 1;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    // -- simple commands ----------------------------------------------------

    fn parse_simple_command(&mut self) -> Result<Command, ParseError> {
        let line = self.line();
        let mut cmd = SimpleCommand { line, ..Default::default() };
        loop {
            self.skip_spaces();
            match self.peek() {
                None | Some('\n') | Some(';') | Some(')') | Some('|') => break,
                Some('&') if self.peek_at(1) != Some('>') => break,
                _ => {}
            }
            if self.redirect_ahead() {
                cmd.redirects.push(self.parse_redirect()?);
                continue;
            }
            if cmd.words.is_empty() {
                if let Some(assignment) = self.try_parse_assignment()? {
                    cmd.assignments.push(assignment);
                    continue;
                }
            }
            // `name ()` turns what looked like a simple command into a
            // function definition.
            if cmd.words.len() == 1
                && cmd.assignments.is_empty()
                && cmd.redirects.is_empty()
                && self.peek() == Some('(')
            {
                let name = cmd.words[0]
                    .static_text()
                    .ok_or_else(|| self.error("bad function name"))?;
                self.pos += 1;
                self.skip_spaces();
                if self.peek() != Some(')') {
                    return Err(self.error("expected `)' in function definition"));
                }
                self.pos += 1;
                self.skip_space_and_newlines();
                let body = self.parse_command()?;
                return Ok(Command::FunctionDef(FunctionDef { name, body: Box::new(body) }));
            }
            cmd.words.push(word::parse_word(self, word::WordMode::Normal)?);
        }
        if cmd.words.is_empty() && cmd.assignments.is_empty() && cmd.redirects.is_empty() {
            return Err(self.error(format!(
                "syntax error near unexpected token `{}'",
                self.peek().unwrap_or(' ')
            )));
        }
        Ok(Command::Simple(cmd))
    }

    fn try_parse_assignment(&mut self) -> Result<Option<Assignment>, ParseError> {
        let start = self.pos;
        let mut i = self.pos;
        match self.chars.get(i) {
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => i += 1,
            _ => return Ok(None),
        }
        while let Some(&c) = self.chars.get(i) {
            if c.is_ascii_alphanumeric() || c == '_' {
                i += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[self.pos..i].iter().collect();
        // Optional [subscript].
        let mut index = None;
        if self.chars.get(i) == Some(&'[') {
            let mut depth = 1;
            let mut j = i + 1;
            let mut text = String::new();
            while let Some(&c) = self.chars.get(j) {
                if c == '[' {
                    depth += 1;
                } else if c == ']' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else if c == '\n' {
                    return Ok(None);
                }
                text.push(c);
                j += 1;
            }
            if self.chars.get(j) != Some(&']') {
                return Ok(None);
            }
            index = Some(text);
            i = j + 1;
        }
        let append = self.chars.get(i) == Some(&'+');
        if append {
            i += 1;
        }
        if self.chars.get(i) != Some(&'=') {
            return Ok(None);
        }
        i += 1;
        self.pos = i;
        // Array literal value.
        if self.peek() == Some('(') && index.is_none() {
            self.pos += 1;
            let mut elements = Vec::new();
            loop {
                self.skip_space_and_newlines();
                if self.peek() == Some(')') {
                    self.pos += 1;
                    break;
                }
                if self.at_end() {
                    self.pos = start;
                    return Err(self.error("unexpected end of file in array assignment"));
                }
                elements.push(word::parse_word(self, word::WordMode::CasePattern)?);
            }
            return Ok(Some(Assignment {
                name,
                index: None,
                append,
                value: None,
                array: Some(elements),
            }));
        }
        // Scalar value (possibly empty).
        let value = match self.peek() {
            None | Some(' ') | Some('\t') | Some('\n') | Some(';') | Some('&') | Some('|')
            | Some(')') => None,
            _ => Some(word::parse_word(self, word::WordMode::Normal)?),
        };
        Ok(Some(Assignment { name, index, append, value, array: None }))
    }

    // -- redirections -------------------------------------------------------

    /// Does a redirection operator start at the cursor (allowing for a
    /// leading fd number)?
    fn redirect_ahead(&self) -> bool {
        let mut i = 0;
        while let Some(c) = self.peek_at(i) {
            if c.is_ascii_digit() {
                i += 1;
            } else {
                break;
            }
        }
        match self.peek_at(i) {
            Some('<') | Some('>') => true,
            Some('&') if i == 0 && self.peek_at(1) == Some('>') => true,
            _ => false,
        }
    }

    fn parse_redirect(&mut self) -> Result<Redirect, ParseError> {
        self.skip_spaces();
        if self.eat("&>>") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd: None, op: RedirectOp::AppendErr, target });
        }
        if self.eat("&>") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd: None, op: RedirectOp::OutErr, target });
        }
        let mut fd_digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                fd_digits.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        let fd = if fd_digits.is_empty() {
            None
        } else {
            Some(
                fd_digits
                    .parse::<i32>()
                    .map_err(|_| self.error("bad file descriptor"))?,
            )
        };
        if self.eat("<<<") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd, op: RedirectOp::HereString, target });
        }
        if self.starts_with("<<") {
            let strip_tabs = self.peek_at(2) == Some('-');
            self.pos += if strip_tabs { 3 } else { 2 };
            return self.parse_heredoc(fd, strip_tabs);
        }
        if self.eat("<&") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd, op: RedirectOp::DupIn, target });
        }
        if self.eat("<") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd, op: RedirectOp::In, target });
        }
        if self.eat(">>") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd, op: RedirectOp::Append, target });
        }
        if self.eat(">&") {
            // `>&n` duplicates; `>&file` sends both streams to the file.
            let target = self.parse_redirect_word()?;
            let is_fd = matches!(
                &target,
                RedirectTarget::Word(w) if w.static_text().map_or(false, |t| {
                    t == "-" || t.chars().all(|c| c.is_ascii_digit())
                })
            );
            let op = if is_fd { RedirectOp::DupOut } else { RedirectOp::OutErr };
            return Ok(Redirect { fd, op, target });
        }
        if self.eat(">|") || self.eat(">") {
            let target = self.parse_redirect_word()?;
            return Ok(Redirect { fd, op: RedirectOp::Out, target });
        }
        Err(self.error("expected redirection operator"))
    }

    fn parse_redirect_word(&mut self) -> Result<RedirectTarget, ParseError> {
        self.skip_spaces();
        if self.at_end() || matches!(self.peek(), Some('\n') | Some(';') | Some('|') | Some('&')) {
            return Err(self.error("syntax error near unexpected token `newline'"));
        }
        Ok(RedirectTarget::Word(word::parse_word(self, word::WordMode::Normal)?))
    }

    fn parse_heredoc(&mut self, fd: Option<i32>, strip_tabs: bool) -> Result<Redirect, ParseError> {
        self.skip_spaces();
        // Delimiter, possibly quoted; quoting disables body expansion.
        let mut quoted = false;
        let mut delimiter = String::new();
        loop {
            match self.peek() {
                Some('\'') | Some('"') => {
                    let quote = self.bump().unwrap_or('\'');
                    quoted = true;
                    while let Some(c) = self.bump() {
                        if c == quote {
                            break;
                        }
                        delimiter.push(c);
                    }
                }
                Some('\\') => {
                    self.pos += 1;
                    quoted = true;
                    if let Some(c) = self.bump() {
                        delimiter.push(c);
                    }
                }
                Some(c) if !c.is_whitespace() && !"|&;<>()".contains(c) => {
                    delimiter.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if delimiter.is_empty() {
            return Err(self.error("expected here-document delimiter"));
        }
        let body_text = self.read_heredoc_body(&delimiter, strip_tabs);
        let body = if quoted {
            Word { parts: vec![WordPart::Literal(body_text)] }
        } else {
            word::parse_heredoc_text(&body_text).map_err(|m| self.error(m))?
        };
        Ok(Redirect {
            fd,
            op: RedirectOp::HereDoc,
            target: RedirectTarget::HereDoc { body, strip_tabs, quoted },
        })
    }

    /// Extract a here-document body ahead of the cursor. Multiple
    /// here-documents on one line consume consecutive regions.
    fn read_heredoc_body(&mut self, delimiter: &str, strip_tabs: bool) -> String {
        let start = self.heredoc_resume.unwrap_or_else(|| {
            let mut i = self.pos;
            while i < self.chars.len() && self.chars[i] != '\n' {
                i += 1;
            }
            i + 1
        });
        let mut body = String::new();
        let mut i = start;
        while i < self.chars.len() {
            let mut line = String::new();
            while i < self.chars.len() && self.chars[i] != '\n' {
                line.push(self.chars[i]);
                i += 1;
            }
            let has_newline = i < self.chars.len();
            if has_newline {
                i += 1;
            }
            let check: &str = if strip_tabs { line.trim_start_matches('\t') } else { &line };
            if check == delimiter {
                self.heredoc_resume = Some(i);
                return body;
            }
            if strip_tabs {
                body.push_str(line.trim_start_matches('\t'));
            } else {
                body.push_str(&line);
            }
            if has_newline {
                body.push('\n');
            }
        }
        // Unterminated here-document: everything to EOF is the body.
        self.heredoc_resume = Some(i);
        body
    }
}

pub(crate) fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_simple(script: &Script) -> &SimpleCommand {
        match &script.statements[0].first.elements[0].command {
            Command::Simple(cmd) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_command() {
        let script = parse("echo hello world").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[0].static_text().unwrap(), "echo");
        assert_eq!(cmd.words[2].static_text().unwrap(), "world");
    }

    #[test]
    fn test_parse_pipeline() {
        let script = parse("a | b |& c").unwrap();
        let pipeline = &script.statements[0].first;
        assert_eq!(pipeline.elements.len(), 3);
        assert!(!pipeline.elements[1].stderr_piped);
        assert!(pipeline.elements[2].stderr_piped);
    }

    #[test]
    fn test_parse_negated_pipeline() {
        let script = parse("! false").unwrap();
        assert!(script.statements[0].first.negated);
    }

    #[test]
    fn test_parse_and_or() {
        let script = parse("a && b || c").unwrap();
        let stmt = &script.statements[0];
        assert_eq!(stmt.rest.len(), 2);
        assert_eq!(stmt.rest[0].0, AndOr::And);
        assert_eq!(stmt.rest[1].0, AndOr::Or);
    }

    #[test]
    fn test_parse_background() {
        let script = parse("sleep 5 &").unwrap();
        assert!(script.statements[0].background);
    }

    #[test]
    fn test_parse_assignments() {
        let script = parse("FOO=bar BAZ=qux cmd").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert_eq!(cmd.words.len(), 1);
    }

    #[test]
    fn test_parse_assignment_only() {
        let script = parse("x=1").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments.len(), 1);
        assert!(cmd.words.is_empty());
    }

    #[test]
    fn test_parse_array_assignment() {
        let script = parse("arr=(a b c)").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.assignments[0].array.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_parse_append_assignment() {
        let script = parse("x+=more").unwrap();
        assert!(first_simple(&script).assignments[0].append);
    }

    #[test]
    fn test_parse_if() {
        let script =
            parse("if true; then echo yes; elif false; then echo maybe; else echo no; fi").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::If { clauses, else_body }, _) => {
                assert_eq!(clauses.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for() {
        let script = parse("for i in a b c; do echo $i; done").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::For { var, words, body }, _) => {
                assert_eq!(var, "i");
                assert_eq!(words.as_ref().unwrap().len(), 3);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_without_in() {
        let script = parse("for arg; do echo $arg; done").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::For { words, .. }, _) => assert!(words.is_none()),
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_arith_for() {
        let script = parse("for ((i=0; i<3; i++)); do echo $i; done").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::ForArith { init, cond, step, .. }, _) => {
                assert!(init.is_some() && cond.is_some() && step.is_some());
            }
            other => panic!("expected arithmetic for, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_while() {
        let script = parse("while true; do break; done").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::Compound(CompoundCommand::While { .. }, _)
        ));
    }

    #[test]
    fn test_parse_until() {
        let script = parse("until false; do break; done").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::Compound(CompoundCommand::Until { .. }, _)
        ));
    }

    #[test]
    fn test_parse_case() {
        let script =
            parse("case $x in a|b) echo ab;; c) echo c;& d) echo d;;& *) echo other;; esac")
                .unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::Case { items, .. }, _) => {
                assert_eq!(items.len(), 4);
                assert_eq!(items[0].patterns.len(), 2);
                assert_eq!(items[0].terminator, CaseTerminator::Break);
                assert_eq!(items[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(items[2].terminator, CaseTerminator::Continue);
            }
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_subshell_and_group() {
        let script = parse("(cd /tmp && pwd)").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::Compound(CompoundCommand::Subshell(_), _)
        ));
        let script = parse("{ echo a; echo b; }").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::Group(body), _) => assert_eq!(body.len(), 2),
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_definitions() {
        let script = parse("greet() { echo hi; }").unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::FunctionDef(def) => assert_eq!(def.name, "greet"),
            other => panic!("expected function def, got {:?}", other),
        }
        let script = parse("function greet { echo hi; }").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::FunctionDef(_)
        ));
    }

    #[test]
    fn test_parse_redirections() {
        let script = parse("cmd < in.txt > out.txt 2> err.txt >> app.txt 2>&1").unwrap();
        let cmd = first_simple(&script);
        assert_eq!(cmd.redirects.len(), 5);
        assert_eq!(cmd.redirects[0].op, RedirectOp::In);
        assert_eq!(cmd.redirects[1].op, RedirectOp::Out);
        assert_eq!(cmd.redirects[2].fd, Some(2));
        assert_eq!(cmd.redirects[3].op, RedirectOp::Append);
        assert_eq!(cmd.redirects[4].op, RedirectOp::DupOut);
    }

    #[test]
    fn test_parse_both_streams_redirect() {
        let script = parse("cmd &> all.txt").unwrap();
        assert_eq!(first_simple(&script).redirects[0].op, RedirectOp::OutErr);
    }

    #[test]
    fn test_parse_here_string() {
        let script = parse("cat <<< hello").unwrap();
        assert_eq!(first_simple(&script).redirects[0].op, RedirectOp::HereString);
    }

    #[test]
    fn test_parse_heredoc() {
        let script = parse("cat <<EOF\nline one\nline two\nEOF\necho after").unwrap();
        assert_eq!(script.statements.len(), 2);
        let cmd = first_simple(&script);
        match &cmd.redirects[0].target {
            RedirectTarget::HereDoc { body, quoted, .. } => {
                assert!(!quoted);
                assert_eq!(body.static_text().unwrap(), "line one\nline two\n");
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_heredoc_quoted_delimiter() {
        let script = parse("cat <<'EOF'\n$HOME stays\nEOF").unwrap();
        match &first_simple(&script).redirects[0].target {
            RedirectTarget::HereDoc { body, quoted, .. } => {
                assert!(quoted);
                assert_eq!(body.static_text().unwrap(), "$HOME stays\n");
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_heredoc_strip_tabs() {
        let script = parse("cat <<-EOF\n\tindented\n\tEOF").unwrap();
        match &first_simple(&script).redirects[0].target {
            RedirectTarget::HereDoc { body, strip_tabs, .. } => {
                assert!(strip_tabs);
                assert_eq!(body.static_text().unwrap(), "indented\n");
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cond_command() {
        let script = parse("[[ -f /etc/passwd && $x == y* ]]").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::Compound(CompoundCommand::Cond(_), _)
        ));
    }

    #[test]
    fn test_parse_arith_command() {
        let script = parse("(( x = 1 + 2 ))").unwrap();
        assert!(matches!(
            &script.statements[0].first.elements[0].command,
            Command::Compound(CompoundCommand::Arith(_), _)
        ));
    }

    #[test]
    fn test_parse_comments_and_blank_lines() {
        let script =
            parse("# leading comment\n\necho one # trailing\n\n# another\necho two\n").unwrap();
        assert_eq!(script.statements.len(), 2);
    }

    #[test]
    fn test_parse_syntax_error() {
        assert!(parse("if then").is_err());
        assert!(parse("for do").is_err());
        assert!(parse("echo )").is_err());
    }

    #[test]
    fn test_parse_multiline_statements() {
        let script = parse("echo one\necho two\necho three").unwrap();
        assert_eq!(script.statements.len(), 3);
    }

    #[test]
    fn test_parse_line_continuation() {
        let script = parse("echo one \\\n two").unwrap();
        assert_eq!(first_simple(&script).words.len(), 3);
    }

    #[test]
    fn test_is_name() {
        assert!(is_name("foo"));
        assert!(is_name("_x9"));
        assert!(!is_name("9x"));
        assert!(!is_name("a-b"));
        assert!(!is_name(""));
    }
}
