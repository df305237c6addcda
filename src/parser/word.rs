//! Word parsing: quoting, expansions, brace items, parameter operations.
//!
//! A word is read as an ordered run of parts; nothing is expanded here.
//! Unquoted runs containing glob metacharacters become `Glob` parts so
//! the expander knows where pathname expansion may apply.

use super::arith;
use super::{ParseError, Parser};
use crate::ast::*;

/// What terminates the word being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMode {
    /// Argv position: stops at whitespace and shell operators.
    Normal,
    /// Case patterns and array elements: `|` and `)` also terminate.
    CasePattern,
    /// Inside `${x:-...}`: only `}` terminates.
    ParamWord,
    /// Inside `${x/.../...}`: `/` and `}` terminate.
    ParamPattern,
    /// Whole-string parse (brace items, here-document bodies).
    Raw,
}

fn is_stop(mode: WordMode, c: char, next: Option<char>) -> bool {
    match mode {
        WordMode::Normal => {
            if (c == '<' || c == '>') && next == Some('(') {
                return false;
            }
            c.is_whitespace() || "|&;()<>".contains(c)
        }
        WordMode::CasePattern => c.is_whitespace() || "|&;)".contains(c) || c == '\n',
        WordMode::ParamWord => c == '}',
        WordMode::ParamPattern => c == '}' || c == '/',
        WordMode::Raw => false,
    }
}

/// Parse one word in the given mode. The cursor must sit on the first
/// character of the word.
pub(crate) fn parse_word(parser: &mut Parser, mode: WordMode) -> Result<Word, ParseError> {
    let mut parts: Vec<WordPart> = Vec::new();
    let mut run = String::new();

    macro_rules! flush {
        () => {
            if !run.is_empty() {
                parts.push(literal_or_glob(std::mem::take(&mut run)));
            }
        };
    }

    // Leading tilde.
    if mode == WordMode::Normal && parser.peek() == Some('~') {
        let mut i = 1;
        let mut user = String::new();
        while let Some(c) = parser.peek_at(i) {
            if c == '/' || c.is_whitespace() || "|&;()<>".contains(c) {
                break;
            }
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                user.push(c);
                i += 1;
            } else {
                user.clear();
                i = 0;
                break;
            }
        }
        if i > 0 {
            parser.advance(i);
            parts.push(WordPart::Tilde(if user.is_empty() { None } else { Some(user) }));
        }
    }

    loop {
        let c = match parser.peek() {
            Some(c) => c,
            None => break,
        };
        if is_stop(mode, c, parser.peek_at(1)) {
            break;
        }
        match c {
            '\'' => {
                flush!();
                parser.advance(1);
                let mut text = String::new();
                loop {
                    match parser.bump() {
                        Some('\'') => break,
                        Some(ch) => text.push(ch),
                        None => return Err(parser.error("unterminated single quote")),
                    }
                }
                parts.push(WordPart::SingleQuoted(text));
            }
            '"' => {
                flush!();
                parser.advance(1);
                parts.push(WordPart::DoubleQuoted(parse_double_quoted(parser)?));
            }
            '\\' => {
                parser.advance(1);
                match parser.peek() {
                    Some('\n') => {
                        parser.advance(1);
                    }
                    Some(ch) => {
                        flush!();
                        parser.advance(1);
                        parts.push(WordPart::Escaped(ch));
                    }
                    None => run.push('\\'),
                }
            }
            '$' => {
                if let Some(part) = parse_dollar(parser)? {
                    flush!();
                    parts.push(part);
                } else {
                    parser.advance(1);
                    run.push('$');
                }
            }
            '`' => {
                flush!();
                parts.push(parse_backquoted(parser)?);
            }
            '{' if mode == WordMode::Normal || mode == WordMode::CasePattern || mode == WordMode::Raw => {
                if let Some(items) = try_parse_brace(parser)? {
                    flush!();
                    parts.push(WordPart::Brace(items));
                } else {
                    parser.advance(1);
                    run.push('{');
                }
            }
            '<' | '>' if parser.peek_at(1) == Some('(') => {
                flush!();
                let output = c == '>';
                parser.advance(2);
                let body = parser.parse_statements_until(Some(')'))?;
                parser.skip_separators();
                if parser.peek() != Some(')') {
                    return Err(parser.error("expected `)' in process substitution"));
                }
                parser.advance(1);
                parts.push(WordPart::ProcessSubst {
                    script: Script { statements: body },
                    output,
                });
            }
            _ => {
                parser.advance(1);
                run.push(c);
            }
        }
    }
    if !run.is_empty() {
        parts.push(literal_or_glob(run));
    }
    if parts.is_empty() {
        parts.push(WordPart::Literal(String::new()));
    }
    Ok(Word { parts })
}

fn literal_or_glob(text: String) -> WordPart {
    if text.contains(['*', '?', '[']) {
        WordPart::Glob(text)
    } else {
        WordPart::Literal(text)
    }
}

/// Inside double quotes: `$`, backquotes, and a few backslash escapes
/// stay special, everything else is literal.
fn parse_double_quoted(parser: &mut Parser) -> Result<Vec<WordPart>, ParseError> {
    let mut parts = Vec::new();
    let mut run = String::new();
    loop {
        match parser.peek() {
            None => return Err(parser.error("unterminated double quote")),
            Some('"') => {
                parser.advance(1);
                break;
            }
            Some('\\') => {
                match parser.peek_at(1) {
                    Some(ch @ ('$' | '`' | '"' | '\\')) => {
                        parser.advance(2);
                        run.push(ch);
                    }
                    Some('\n') => parser.advance(2),
                    _ => {
                        parser.advance(1);
                        run.push('\\');
                    }
                }
            }
            Some('$') => {
                if let Some(part) = parse_dollar(parser)? {
                    if !run.is_empty() {
                        parts.push(WordPart::Literal(std::mem::take(&mut run)));
                    }
                    parts.push(part);
                } else {
                    parser.advance(1);
                    run.push('$');
                }
            }
            Some('`') => {
                if !run.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut run)));
                }
                parts.push(parse_backquoted(parser)?);
            }
            Some(c) => {
                parser.advance(1);
                run.push(c);
            }
        }
    }
    if !run.is_empty() {
        parts.push(WordPart::Literal(run));
    }
    Ok(parts)
}

/// Parse a here-document body: double-quote rules without the quotes.
pub(crate) fn parse_heredoc_text(text: &str) -> Result<Word, String> {
    let mut parser = Parser::new(text);
    let mut parts = Vec::new();
    let mut run = String::new();
    loop {
        match parser.peek() {
            None => break,
            Some('\\') => match parser.peek_at(1) {
                Some(ch @ ('$' | '`' | '\\')) => {
                    parser.advance(2);
                    run.push(ch);
                }
                Some('\n') => parser.advance(2),
                _ => {
                    parser.advance(1);
                    run.push('\\');
                }
            },
            Some('$') => {
                if let Some(part) = parse_dollar(&mut parser).map_err(|e| e.message)? {
                    if !run.is_empty() {
                        parts.push(WordPart::Literal(std::mem::take(&mut run)));
                    }
                    parts.push(part);
                } else {
                    parser.advance(1);
                    run.push('$');
                }
            }
            Some('`') => {
                if !run.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut run)));
                }
                parts.push(parse_backquoted(&mut parser).map_err(|e| e.message)?);
            }
            Some(c) => {
                parser.advance(1);
                run.push(c);
            }
        }
    }
    if !run.is_empty() {
        parts.push(WordPart::Literal(run));
    }
    if parts.is_empty() {
        parts.push(WordPart::Literal(String::new()));
    }
    Ok(Word { parts })
}

// ---------------------------------------------------------------------------
// $ expansions
// ---------------------------------------------------------------------------

const SPECIAL_PARAMS: &str = "?$!#-@*0123456789";

/// Parse whatever follows a `$`. Returns None when the `$` is literal.
fn parse_dollar(parser: &mut Parser) -> Result<Option<WordPart>, ParseError> {
    debug_assert_eq!(parser.peek(), Some('$'));
    match parser.peek_at(1) {
        Some('(') if parser.peek_at(2) == Some('(') => {
            parser.advance(3);
            let text = take_arith_text(parser)?;
            let expr = arith::parse_arith(&text).map_err(|m| parser.error(m))?;
            Ok(Some(WordPart::Arith(expr)))
        }
        Some('(') => {
            parser.advance(2);
            let statements = parser.parse_statements_until(Some(')'))?;
            parser.skip_separators();
            if parser.peek() != Some(')') {
                return Err(parser.error("expected `)' in command substitution"));
            }
            parser.advance(1);
            Ok(Some(WordPart::CommandSubst(Script { statements })))
        }
        Some('{') => {
            parser.advance(2);
            parse_braced_param(parser).map(Some)
        }
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            parser.advance(1);
            let mut name = String::new();
            while let Some(c) = parser.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    parser.advance(1);
                } else {
                    break;
                }
            }
            Ok(Some(WordPart::Param(ParamExp::plain(name))))
        }
        Some(c) if SPECIAL_PARAMS.contains(c) => {
            parser.advance(2);
            Ok(Some(WordPart::Param(ParamExp::plain(c.to_string()))))
        }
        _ => Ok(None),
    }
}

/// Capture the text of `$(( ... ))` up to the matching `))`.
fn take_arith_text(parser: &mut Parser) -> Result<String, ParseError> {
    let mut depth = 0usize;
    let mut text = String::new();
    loop {
        match parser.peek() {
            None => return Err(parser.error("unexpected end of file looking for `))'")),
            Some(')') if depth == 0 && parser.peek_at(1) == Some(')') => {
                parser.advance(2);
                return Ok(text);
            }
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
            Some(c) => {
                text.push(c);
                parser.advance(1);
            }
        }
    }
}

/// Body of `${ ... }` after the opening brace.
fn parse_braced_param(parser: &mut Parser) -> Result<WordPart, ParseError> {
    // ${#name} and the bare ${#}.
    if parser.peek() == Some('#') {
        if parser.peek_at(1) == Some('}') {
            parser.advance(2);
            return Ok(WordPart::Param(ParamExp::plain("#")));
        }
        parser.advance(1);
        let (name, index) = parse_param_name(parser)?;
        expect_close(parser)?;
        return Ok(WordPart::Param(ParamExp {
            name,
            index,
            op: Some(ParamOp::Length),
        }));
    }
    // ${!name} indirection.
    if parser.peek() == Some('!') && parser.peek_at(1) != Some('}') {
        parser.advance(1);
        let (name, index) = parse_param_name(parser)?;
        expect_close(parser)?;
        return Ok(WordPart::Param(ParamExp {
            name,
            index,
            op: Some(ParamOp::Indirect),
        }));
    }
    let (name, index) = parse_param_name(parser)?;
    let op = parse_param_op(parser)?;
    expect_close(parser)?;
    Ok(WordPart::Param(ParamExp { name, index, op }))
}

fn expect_close(parser: &mut Parser) -> Result<(), ParseError> {
    if parser.peek() == Some('}') {
        parser.advance(1);
        Ok(())
    } else {
        Err(parser.error("bad substitution"))
    }
}

fn parse_param_name(parser: &mut Parser) -> Result<(String, Option<ParamIndex>), ParseError> {
    let mut name = String::new();
    match parser.peek() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            while let Some(c) = parser.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    parser.advance(1);
                } else {
                    break;
                }
            }
        }
        Some(c) if SPECIAL_PARAMS.contains(c) => {
            name.push(c);
            parser.advance(1);
            // Multi-digit positionals: ${10}.
            if c.is_ascii_digit() {
                while let Some(d) = parser.peek() {
                    if d.is_ascii_digit() {
                        name.push(d);
                        parser.advance(1);
                    } else {
                        break;
                    }
                }
            }
        }
        _ => return Err(parser.error("bad substitution")),
    }
    let mut index = None;
    if parser.peek() == Some('[') {
        parser.advance(1);
        let mut depth = 1;
        let mut text = String::new();
        loop {
            match parser.bump() {
                None => return Err(parser.error("bad substitution")),
                Some('[') => {
                    depth += 1;
                    text.push('[');
                }
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    text.push(']');
                }
                Some(c) => text.push(c),
            }
        }
        index = Some(match text.as_str() {
            "@" => ParamIndex::At,
            "*" => ParamIndex::Star,
            _ => ParamIndex::Expr(text),
        });
    }
    Ok((name, index))
}

fn parse_param_op(parser: &mut Parser) -> Result<Option<ParamOp>, ParseError> {
    match parser.peek() {
        Some('}') | None => Ok(None),
        Some(':') => {
            match parser.peek_at(1) {
                Some('-') => {
                    parser.advance(2);
                    let word = parse_word(parser, WordMode::ParamWord)?;
                    Ok(Some(ParamOp::Default { word, colon: true }))
                }
                Some('=') => {
                    parser.advance(2);
                    let word = parse_word(parser, WordMode::ParamWord)?;
                    Ok(Some(ParamOp::Assign { word, colon: true }))
                }
                Some('?') => {
                    parser.advance(2);
                    let word = if parser.peek() == Some('}') {
                        None
                    } else {
                        Some(parse_word(parser, WordMode::ParamWord)?)
                    };
                    Ok(Some(ParamOp::Error { word, colon: true }))
                }
                Some('+') => {
                    parser.advance(2);
                    let word = parse_word(parser, WordMode::ParamWord)?;
                    Ok(Some(ParamOp::Alternative { word, colon: true }))
                }
                _ => {
                    // ${x:offset} / ${x:offset:length}
                    parser.advance(1);
                    let offset_text = take_substring_field(parser)?;
                    let offset = arith::parse_arith(offset_text.trim())
                        .map_err(|m| parser.error(m))?;
                    let length = if parser.peek() == Some(':') {
                        parser.advance(1);
                        let text = take_substring_field(parser)?;
                        Some(arith::parse_arith(text.trim()).map_err(|m| parser.error(m))?)
                    } else {
                        None
                    };
                    Ok(Some(ParamOp::Substring { offset, length }))
                }
            }
        }
        Some('-') => {
            parser.advance(1);
            let word = parse_word(parser, WordMode::ParamWord)?;
            Ok(Some(ParamOp::Default { word, colon: false }))
        }
        Some('=') => {
            parser.advance(1);
            let word = parse_word(parser, WordMode::ParamWord)?;
            Ok(Some(ParamOp::Assign { word, colon: false }))
        }
        Some('?') => {
            parser.advance(1);
            let word = if parser.peek() == Some('}') {
                None
            } else {
                Some(parse_word(parser, WordMode::ParamWord)?)
            };
            Ok(Some(ParamOp::Error { word, colon: false }))
        }
        Some('+') => {
            parser.advance(1);
            let word = parse_word(parser, WordMode::ParamWord)?;
            Ok(Some(ParamOp::Alternative { word, colon: false }))
        }
        Some('#') => {
            let greedy = parser.peek_at(1) == Some('#');
            parser.advance(if greedy { 2 } else { 1 });
            let pattern = parse_word(parser, WordMode::ParamWord)?;
            Ok(Some(ParamOp::RemovePrefix { pattern, greedy }))
        }
        Some('%') => {
            let greedy = parser.peek_at(1) == Some('%');
            parser.advance(if greedy { 2 } else { 1 });
            let pattern = parse_word(parser, WordMode::ParamWord)?;
            Ok(Some(ParamOp::RemoveSuffix { pattern, greedy }))
        }
        Some('/') => {
            parser.advance(1);
            let mut all = false;
            let mut anchor = None;
            match parser.peek() {
                Some('/') => {
                    all = true;
                    parser.advance(1);
                }
                Some('#') => {
                    anchor = Some(ReplaceAnchor::Start);
                    parser.advance(1);
                }
                Some('%') => {
                    anchor = Some(ReplaceAnchor::End);
                    parser.advance(1);
                }
                _ => {}
            }
            let pattern = parse_word(parser, WordMode::ParamPattern)?;
            let replacement = if parser.peek() == Some('/') {
                parser.advance(1);
                Some(parse_word(parser, WordMode::ParamWord)?)
            } else {
                None
            };
            Ok(Some(ParamOp::Replace { pattern, replacement, all, anchor }))
        }
        Some('^') => {
            let all = parser.peek_at(1) == Some('^');
            parser.advance(if all { 2 } else { 1 });
            skip_casemod_pattern(parser);
            Ok(Some(ParamOp::CaseMod { upper: true, all }))
        }
        Some(',') => {
            let all = parser.peek_at(1) == Some(',');
            parser.advance(if all { 2 } else { 1 });
            skip_casemod_pattern(parser);
            Ok(Some(ParamOp::CaseMod { upper: false, all }))
        }
        Some(_) => Err(parser.error("bad substitution")),
    }
}

/// Optional pattern argument of `${x^pat}`; accepted and ignored.
fn skip_casemod_pattern(parser: &mut Parser) {
    while let Some(c) = parser.peek() {
        if c == '}' {
            break;
        }
        parser.advance(1);
    }
}

/// Raw text of a substring offset or length, up to `:` or `}` at depth 0.
fn take_substring_field(parser: &mut Parser) -> Result<String, ParseError> {
    let mut depth = 0usize;
    let mut text = String::new();
    loop {
        match parser.peek() {
            None => return Err(parser.error("bad substitution")),
            Some(':') | Some('}') if depth == 0 => return Ok(text),
            Some(c) => {
                if c == '(' || c == '{' {
                    depth += 1;
                } else if c == ')' || c == '}' {
                    depth = depth.saturating_sub(1);
                }
                text.push(c);
                parser.advance(1);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backquotes
// ---------------------------------------------------------------------------

fn parse_backquoted(parser: &mut Parser) -> Result<WordPart, ParseError> {
    debug_assert_eq!(parser.peek(), Some('`'));
    parser.advance(1);
    let mut text = String::new();
    loop {
        match parser.bump() {
            None => return Err(parser.error("unterminated backquote")),
            Some('`') => break,
            Some('\\') => match parser.peek() {
                Some(ch @ ('`' | '$' | '\\')) => {
                    text.push(ch);
                    parser.advance(1);
                }
                _ => text.push('\\'),
            },
            Some(c) => text.push(c),
        }
    }
    let script = super::parse(&text)?;
    Ok(WordPart::CommandSubst(script))
}

// ---------------------------------------------------------------------------
// Brace expansion
// ---------------------------------------------------------------------------

/// Attempt `{...}` as a brace expansion. Returns None (cursor untouched)
/// when the braces do not form one, so the `{` stays literal.
fn try_parse_brace(parser: &mut Parser) -> Result<Option<Vec<BraceItem>>, ParseError> {
    debug_assert_eq!(parser.peek(), Some('{'));
    // Scan for the matching close brace, tracking quotes and nesting.
    let mut i = 1usize;
    let mut depth = 1usize;
    let mut top_level_comma = false;
    let mut content = String::new();
    loop {
        let c = match parser.peek_at(i) {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => top_level_comma = true,
            '\'' => {
                content.push(c);
                i += 1;
                loop {
                    match parser.peek_at(i) {
                        Some('\'') => break,
                        Some(q) => {
                            content.push(q);
                            i += 1;
                        }
                        None => return Ok(None),
                    }
                }
            }
            '\\' => {
                content.push(c);
                i += 1;
                if parser.peek_at(i).is_none() {
                    return Ok(None);
                }
            }
            ' ' | '\t' | '\n' => return Ok(None),
            _ => {}
        }
        content.push(parser.peek_at(i).unwrap_or(c));
        i += 1;
    }
    let total = i + 1;

    if !top_level_comma {
        if let Some(range) = parse_range_item(&content) {
            parser.advance(total);
            return Ok(Some(vec![range]));
        }
        return Ok(None);
    }

    // Split the content on top-level commas and parse each item.
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut in_single = false;
    let mut escaped = false;
    for c in content.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '\'' => {
                in_single = !in_single;
                current.push(c);
            }
            '{' if !in_single => {
                depth += 1;
                current.push(c);
            }
            '}' if !in_single => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 && !in_single => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    let mut parsed = Vec::new();
    for item in items {
        let mut sub = Parser::new(&item);
        let word = parse_word(&mut sub, WordMode::Raw)?;
        parsed.push(BraceItem::Word(word));
    }
    parser.advance(total);
    Ok(Some(parsed))
}

/// `{1..5}`, `{a..z}`, `{10..1..2}`, `{01..10}` forms.
fn parse_range_item(content: &str) -> Option<BraceItem> {
    let pieces: Vec<&str> = content.split("..").collect();
    if pieces.len() != 2 && pieces.len() != 3 {
        return None;
    }
    let step = if pieces.len() == 3 {
        Some(pieces[2].parse::<i64>().ok()?)
    } else {
        None
    };
    // Numeric range.
    if let (Ok(a), Ok(b)) = (pieces[0].parse::<i64>(), pieces[1].parse::<i64>()) {
        let pad = |s: &str| {
            let digits = s.strip_prefix('-').unwrap_or(s);
            digits.len() > 1 && digits.starts_with('0')
        };
        let width = if pad(pieces[0]) || pad(pieces[1]) {
            pieces[0]
                .trim_start_matches('-')
                .len()
                .max(pieces[1].trim_start_matches('-').len())
        } else {
            0
        };
        return Some(BraceItem::Range {
            start: RangeEnd::Int(a),
            end: RangeEnd::Int(b),
            step,
            width,
        });
    }
    // Character range.
    let mut a = pieces[0].chars();
    let mut b = pieces[1].chars();
    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(ca), None, Some(cb), None)
            if ca.is_ascii_alphabetic() && cb.is_ascii_alphabetic() =>
        {
            Some(BraceItem::Range {
                start: RangeEnd::Char(ca),
                end: RangeEnd::Char(cb),
                step,
                width: 0,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_of(source: &str) -> Word {
        let mut parser = Parser::new(source);
        parse_word(&mut parser, WordMode::Normal).unwrap()
    }

    #[test]
    fn test_plain_word() {
        let w = word_of("hello");
        assert_eq!(w.parts, vec![WordPart::Literal("hello".into())]);
    }

    #[test]
    fn test_glob_word() {
        let w = word_of("*.txt");
        assert_eq!(w.parts, vec![WordPart::Glob("*.txt".into())]);
    }

    #[test]
    fn test_single_quotes() {
        let w = word_of("'a $b c'");
        assert_eq!(w.parts, vec![WordPart::SingleQuoted("a $b c".into())]);
    }

    #[test]
    fn test_double_quotes_with_param() {
        let w = word_of("\"x${HOME}y\"");
        match &w.parts[0] {
            WordPart::DoubleQuoted(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[1], WordPart::Param(p) if p.name == "HOME"));
            }
            other => panic!("expected double quoted, got {:?}", other),
        }
    }

    #[test]
    fn test_escape() {
        let w = word_of("a\\ b");
        assert_eq!(
            w.parts,
            vec![
                WordPart::Literal("a".into()),
                WordPart::Escaped(' '),
                WordPart::Literal("b".into()),
            ]
        );
    }

    #[test]
    fn test_simple_param() {
        let w = word_of("$HOME");
        assert!(matches!(&w.parts[0], WordPart::Param(p) if p.name == "HOME" && p.op.is_none()));
    }

    #[test]
    fn test_special_params() {
        for (src, name) in [("$?", "?"), ("$#", "#"), ("$$", "$"), ("$!", "!"), ("$0", "0")] {
            let w = word_of(src);
            assert!(
                matches!(&w.parts[0], WordPart::Param(p) if p.name == name),
                "source {}",
                src
            );
        }
    }

    #[test]
    fn test_literal_dollar() {
        let w = word_of("$%x");
        assert_eq!(
            w.parts,
            vec![WordPart::Literal("$%x".into())]
        );
    }

    #[test]
    fn test_param_default_op() {
        let w = word_of("${x:-fallback}");
        match &w.parts[0] {
            WordPart::Param(p) => match &p.op {
                Some(ParamOp::Default { word, colon }) => {
                    assert!(colon);
                    assert_eq!(word.static_text().unwrap(), "fallback");
                }
                other => panic!("expected default op, got {:?}", other),
            },
            other => panic!("expected param, got {:?}", other),
        }
    }

    #[test]
    fn test_param_ops_parse() {
        for src in [
            "${x-w}", "${x:=w}", "${x=w}", "${x:?msg}", "${x?}", "${x:+w}", "${x+w}",
            "${#x}", "${x:1:2}", "${x:1}", "${x#p}", "${x##p}", "${x%p}", "${x%%p}",
            "${x/a/b}", "${x//a/b}", "${x/#a/b}", "${x/%a/b}", "${x/a}", "${x^}",
            "${x^^}", "${x,}", "${x,,}", "${!x}",
        ] {
            let w = word_of(src);
            assert!(
                matches!(&w.parts[0], WordPart::Param(p) if p.op.is_some()),
                "source {}",
                src
            );
        }
    }

    #[test]
    fn test_param_length_of_count() {
        let w = word_of("${#}");
        assert!(matches!(&w.parts[0], WordPart::Param(p) if p.name == "#" && p.op.is_none()));
    }

    #[test]
    fn test_array_subscripts() {
        let w = word_of("${arr[@]}");
        match &w.parts[0] {
            WordPart::Param(p) => assert_eq!(p.index, Some(ParamIndex::At)),
            other => panic!("expected param, got {:?}", other),
        }
        let w = word_of("${arr[i+1]}");
        match &w.parts[0] {
            WordPart::Param(p) => {
                assert_eq!(p.index, Some(ParamIndex::Expr("i+1".into())));
            }
            other => panic!("expected param, got {:?}", other),
        }
    }

    #[test]
    fn test_command_substitution() {
        let w = word_of("$(echo hi)");
        match &w.parts[0] {
            WordPart::CommandSubst(script) => assert_eq!(script.statements.len(), 1),
            other => panic!("expected command subst, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_command_substitution() {
        let w = word_of("$(echo $(echo inner))");
        assert!(matches!(&w.parts[0], WordPart::CommandSubst(_)));
    }

    #[test]
    fn test_backquotes() {
        let w = word_of("`echo hi`");
        assert!(matches!(&w.parts[0], WordPart::CommandSubst(_)));
    }

    #[test]
    fn test_arith_expansion() {
        let w = word_of("$((1+2))");
        assert!(matches!(&w.parts[0], WordPart::Arith(_)));
    }

    #[test]
    fn test_tilde() {
        let w = word_of("~/docs");
        assert_eq!(w.parts[0], WordPart::Tilde(None));
        assert_eq!(w.parts[1], WordPart::Literal("/docs".into()));
        let w = word_of("~alice/x");
        assert_eq!(w.parts[0], WordPart::Tilde(Some("alice".into())));
    }

    #[test]
    fn test_brace_list() {
        let w = word_of("a{b,c}d");
        assert_eq!(w.parts.len(), 3);
        match &w.parts[1] {
            WordPart::Brace(items) => assert_eq!(items.len(), 2),
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_empty_alternative() {
        let w = word_of("a{,b}");
        match &w.parts[1] {
            WordPart::Brace(items) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    BraceItem::Word(word) => assert_eq!(word.static_text().unwrap(), ""),
                    other => panic!("expected word item, got {:?}", other),
                }
            }
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_numeric_range() {
        let w = word_of("{1..5}");
        match &w.parts[0] {
            WordPart::Brace(items) => match &items[0] {
                BraceItem::Range { start, end, step, width } => {
                    assert_eq!(*start, RangeEnd::Int(1));
                    assert_eq!(*end, RangeEnd::Int(5));
                    assert_eq!(*step, None);
                    assert_eq!(*width, 0);
                }
                other => panic!("expected range, got {:?}", other),
            },
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_padded_range() {
        let w = word_of("{01..10}");
        match &w.parts[0] {
            WordPart::Brace(items) => match &items[0] {
                BraceItem::Range { width, .. } => assert_eq!(*width, 2),
                other => panic!("expected range, got {:?}", other),
            },
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_char_range_with_step() {
        let w = word_of("{a..e..2}");
        match &w.parts[0] {
            WordPart::Brace(items) => match &items[0] {
                BraceItem::Range { start, end, step, .. } => {
                    assert_eq!(*start, RangeEnd::Char('a'));
                    assert_eq!(*end, RangeEnd::Char('e'));
                    assert_eq!(*step, Some(2));
                }
                other => panic!("expected range, got {:?}", other),
            },
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_braces_stay_literal() {
        let w = word_of("{abc}");
        assert_eq!(w.parts, vec![WordPart::Literal("{abc}".into())]);
    }

    #[test]
    fn test_process_substitution() {
        let w = word_of("<(echo hi)");
        assert!(matches!(&w.parts[0], WordPart::ProcessSubst { output: false, .. }));
        let w = word_of(">(cat)");
        assert!(matches!(&w.parts[0], WordPart::ProcessSubst { output: true, .. }));
    }

    #[test]
    fn test_heredoc_text_expansions() {
        let w = parse_heredoc_text("value: $x\nliteral: \\$y\n").unwrap();
        assert!(w.parts.iter().any(|p| matches!(p, WordPart::Param(q) if q.name == "x")));
        let text: String = w
            .parts
            .iter()
            .filter_map(|p| match p {
                WordPart::Literal(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert!(text.contains("$y"));
    }

    #[test]
    fn test_unterminated_quote_errors() {
        let mut parser = Parser::new("'abc");
        assert!(parse_word(&mut parser, WordMode::Normal).is_err());
        let mut parser = Parser::new("\"abc");
        assert!(parse_word(&mut parser, WordMode::Normal).is_err());
    }
}
