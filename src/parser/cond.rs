//! Parser for `[[ ... ]]` conditional expressions.

use super::word::{parse_word, WordMode};
use super::{ParseError, Parser};
use crate::ast::{CondExpr, Word};

const UNARY_OPS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-p", "-r", "-s", "-t", "-u",
    "-w", "-x", "-G", "-L", "-N", "-O", "-S", "-z", "-n", "-o", "-v", "-R",
];

const BINARY_OPS: &[&str] = &[
    "==", "=~", "!=", "=", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt",
    "-ot", "-ef",
];

/// Parse the expression between `[[` and `]]`, consuming the closing
/// brackets.
pub(crate) fn parse_cond(parser: &mut Parser) -> Result<CondExpr, ParseError> {
    let expr = parse_or(parser)?;
    skip_cond_ws(parser);
    if !parser.eat("]]") {
        return Err(parser.error("expected `]]'"));
    }
    Ok(expr)
}

/// Whitespace inside `[[ ]]` may include newlines.
fn skip_cond_ws(parser: &mut Parser) {
    loop {
        match parser.peek() {
            Some(' ') | Some('\t') | Some('\n') => parser.advance(1),
            Some('\\') if parser.peek_at(1) == Some('\n') => parser.advance(2),
            _ => break,
        }
    }
}

fn at_close(parser: &Parser) -> bool {
    parser.starts_with("]]")
}

fn parse_or(parser: &mut Parser) -> Result<CondExpr, ParseError> {
    let mut lhs = parse_and(parser)?;
    loop {
        skip_cond_ws(parser);
        if parser.eat("||") {
            let rhs = parse_and(parser)?;
            lhs = CondExpr::Or(Box::new(lhs), Box::new(rhs));
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_and(parser: &mut Parser) -> Result<CondExpr, ParseError> {
    let mut lhs = parse_term(parser)?;
    loop {
        skip_cond_ws(parser);
        if parser.eat("&&") {
            let rhs = parse_term(parser)?;
            lhs = CondExpr::And(Box::new(lhs), Box::new(rhs));
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_term(parser: &mut Parser) -> Result<CondExpr, ParseError> {
    skip_cond_ws(parser);
    if parser.eat("!") {
        // `!word` with no space means a literal word; bash requires space.
        return Ok(CondExpr::Not(Box::new(parse_term(parser)?)));
    }
    if parser.peek() == Some('(') {
        parser.advance(1);
        let inner = parse_or(parser)?;
        skip_cond_ws(parser);
        if parser.peek() != Some(')') {
            return Err(parser.error("expected `)' in conditional expression"));
        }
        parser.advance(1);
        return Ok(inner);
    }
    // Unary operator?
    for op in UNARY_OPS {
        if cond_token_ahead(parser, op) {
            parser.advance(op.len());
            skip_cond_ws(parser);
            let operand = parse_cond_word(parser)?;
            return Ok(CondExpr::Unary { op: op.to_string(), operand });
        }
    }
    let lhs = parse_cond_word(parser)?;
    skip_cond_ws(parser);
    if at_close(parser) || parser.starts_with("&&") || parser.starts_with("||")
        || parser.peek() == Some(')')
    {
        return Ok(CondExpr::Word(lhs));
    }
    for op in BINARY_OPS {
        if cond_op_ahead(parser, op) {
            parser.advance(op.len());
            skip_cond_ws(parser);
            let rhs = if *op == "=~" {
                parse_regex_word(parser)?
            } else {
                parse_cond_word(parser)?
            };
            return Ok(CondExpr::Binary { op: op.to_string(), lhs, rhs });
        }
    }
    Ok(CondExpr::Word(lhs))
}

/// A `-x` style token followed by whitespace.
fn cond_token_ahead(parser: &Parser, op: &str) -> bool {
    if !parser.starts_with(op) {
        return false;
    }
    matches!(
        parser.peek_at(op.len()),
        Some(' ') | Some('\t') | Some('\n')
    )
}

/// A binary operator token: delimited, and `=` must not shadow `==`/`=~`.
fn cond_op_ahead(parser: &Parser, op: &str) -> bool {
    if !parser.starts_with(op) {
        return false;
    }
    if op == "=" {
        if matches!(parser.peek_at(1), Some('=') | Some('~')) {
            return false;
        }
    }
    if op.starts_with('-') {
        return matches!(parser.peek_at(op.len()), Some(' ') | Some('\t') | Some('\n'));
    }
    true
}

fn parse_cond_word(parser: &mut Parser) -> Result<Word, ParseError> {
    skip_cond_ws(parser);
    if at_close(parser) {
        return Err(parser.error("expected expression in `[[ ]]'"));
    }
    parse_word(parser, WordMode::CasePattern)
}

/// The right-hand side of `=~`: everything to the next unquoted
/// whitespace, with `(`/`)` and `|` allowed as regex syntax.
fn parse_regex_word(parser: &mut Parser) -> Result<Word, ParseError> {
    skip_cond_ws(parser);
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match parser.peek() {
            None => break,
            Some(c) if c.is_whitespace() && depth == 0 => break,
            Some(']') if depth == 0 && parser.peek_at(1) == Some(']') => break,
            Some('(') => {
                depth += 1;
                text.push('(');
                parser.advance(1);
            }
            Some(')') => {
                depth = depth.saturating_sub(1);
                text.push(')');
                parser.advance(1);
            }
            Some('\\') => {
                parser.advance(1);
                text.push('\\');
                if let Some(c) = parser.bump() {
                    text.push(c);
                }
            }
            Some('$') => {
                // Variables are legal inside the regex.
                let mut sub = Word::default();
                if let Ok(word) = parse_word_fragment(parser) {
                    sub = word;
                }
                if sub.parts.is_empty() {
                    text.push('$');
                    parser.advance(1);
                } else {
                    let mut parts = vec![crate::ast::WordPart::Literal(std::mem::take(&mut text))];
                    parts.extend(sub.parts);
                    let rest = parse_regex_word(parser)?;
                    parts.extend(rest.parts);
                    return Ok(Word { parts });
                }
            }
            Some(c) => {
                text.push(c);
                parser.advance(1);
            }
        }
    }
    Ok(Word { parts: vec![crate::ast::WordPart::Literal(text)] })
}

/// A single `$...` expansion used inside a regex.
fn parse_word_fragment(parser: &mut Parser) -> Result<Word, ParseError> {
    let start_parts = parse_word(parser, WordMode::CasePattern)?;
    Ok(start_parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::{Command, CompoundCommand};

    fn cond_of(source: &str) -> CondExpr {
        let script = parse(source).unwrap();
        match &script.statements[0].first.elements[0].command {
            Command::Compound(CompoundCommand::Cond(expr), _) => expr.clone(),
            other => panic!("expected cond, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_file_test() {
        match cond_of("[[ -f /etc/passwd ]]") {
            CondExpr::Unary { op, operand } => {
                assert_eq!(op, "-f");
                assert_eq!(operand.static_text().unwrap(), "/etc/passwd");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_string_comparison() {
        match cond_of("[[ $x == hello ]]") {
            CondExpr::Binary { op, rhs, .. } => {
                assert_eq!(op, "==");
                assert_eq!(rhs.static_text().unwrap(), "hello");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_comparison() {
        match cond_of("[[ 3 -lt 5 ]]") {
            CondExpr::Binary { op, .. } => assert_eq!(op, "-lt"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_negation_and_grouping() {
        match cond_of("[[ ! ( -z $x || -z $y ) ]]") {
            CondExpr::Not(inner) => assert!(matches!(*inner, CondExpr::Or(_, _))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_and_or_precedence() {
        // && binds tighter than ||
        match cond_of("[[ -n a || -n b && -n c ]]") {
            CondExpr::Or(_, rhs) => assert!(matches!(*rhs, CondExpr::And(_, _))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bare_word() {
        match cond_of("[[ $x ]]") {
            CondExpr::Word(_) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_regex_match() {
        match cond_of("[[ $x =~ ^ab(c|d)+$ ]]") {
            CondExpr::Binary { op, rhs, .. } => {
                assert_eq!(op, "=~");
                assert_eq!(rhs.static_text().unwrap(), "^ab(c|d)+$");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_single_equals() {
        match cond_of("[[ a = a ]]") {
            CondExpr::Binary { op, .. } => assert_eq!(op, "="),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
