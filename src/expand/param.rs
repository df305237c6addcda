//! Parameter expansion: `$name`, `${name}` and the operation suffixes.

use regex_lite::Regex;

use super::arith::eval_arith;
use super::pattern::glob_to_regex;
use super::{ExpandError, ExpansionHost, FieldAssembler};
use crate::ast::{ParamExp, ParamIndex, ParamOp, ReplaceAnchor};
use crate::parser::arith::parse_arith;

/// A resolved parameter before assembly: scalar or element list.
enum Value {
    Single(String),
    Multi(Vec<String>),
}

/// Expand one parameter part into the field assembler.
pub(crate) fn expand_param_into(
    exp: &ParamExp,
    host: &mut dyn ExpansionHost,
    quoted: bool,
    asm: &mut FieldAssembler,
) -> Result<(), ExpandError> {
    let star = exp.name == "*" || exp.index == Some(ParamIndex::Star);
    match resolve(exp, host)? {
        Value::Single(text) => {
            if quoted {
                asm.push_quoted(&text);
            } else {
                asm.push_expanded(&text);
            }
        }
        Value::Multi(items) => {
            if quoted && star {
                let join = join_char(host);
                asm.push_quoted(&items.join(&join));
            } else if quoted {
                asm.push_quoted_list(&items);
            } else {
                asm.push_expanded(&items.join(" "));
            }
        }
    }
    Ok(())
}

fn join_char(host: &mut dyn ExpansionHost) -> String {
    host.ifs().chars().next().map(|c| c.to_string()).unwrap_or_default()
}

/// Base lookup plus the operation table.
fn resolve(exp: &ParamExp, host: &mut dyn ExpansionHost) -> Result<Value, ExpandError> {
    let multi = exp.name == "@"
        || exp.name == "*"
        || matches!(exp.index, Some(ParamIndex::At) | Some(ParamIndex::Star));

    // Base value.
    let (mut value, mut is_set): (Value, bool) = if exp.name == "@" || exp.name == "*" {
        let params = host.positionals();
        let set = !params.is_empty();
        (Value::Multi(params), set)
    } else if multi {
        match host.array_items(&exp.name) {
            Some(items) => (Value::Multi(items), true),
            None => match host.get_var(&exp.name) {
                Some(v) => (Value::Multi(vec![v]), true),
                None => (Value::Multi(Vec::new()), false),
            },
        }
    } else if let Some(ParamIndex::Expr(text)) = &exp.index {
        let idx_expr = parse_arith(text).map_err(ExpandError::new)?;
        let idx = eval_arith(&idx_expr, host)?;
        match host.array_item_at(&exp.name, idx) {
            Some(v) => (Value::Single(v), true),
            None => (Value::Single(String::new()), false),
        }
    } else {
        match host.get_var(&exp.name) {
            Some(v) => (Value::Single(v), true),
            None => (Value::Single(String::new()), false),
        }
    };

    let is_empty = match &value {
        Value::Single(s) => s.is_empty(),
        Value::Multi(items) => items.is_empty(),
    };

    let op = match &exp.op {
        None => {
            check_nounset(exp, host, is_set)?;
            return Ok(value);
        }
        Some(op) => op,
    };

    match op {
        ParamOp::Default { word, colon } => {
            if !is_set || (*colon && is_empty) {
                return Ok(Value::Single(super::expand_word_single(word, host)?));
            }
            Ok(value)
        }
        ParamOp::Assign { word, colon } => {
            if !is_set || (*colon && is_empty) {
                let text = super::expand_word_single(word, host)?;
                host.set_var(&exp.name, &text);
                return Ok(Value::Single(text));
            }
            Ok(value)
        }
        ParamOp::Error { word, colon } => {
            if !is_set || (*colon && is_empty) {
                let message = match word {
                    Some(w) => super::expand_word_single(w, host)?,
                    None => "parameter null or not set".to_string(),
                };
                return Err(ExpandError::new(format!("{}: {}", exp.name, message)));
            }
            Ok(value)
        }
        ParamOp::Alternative { word, colon } => {
            if is_set && !(*colon && is_empty) {
                return Ok(Value::Single(super::expand_word_single(word, host)?));
            }
            Ok(Value::Single(String::new()))
        }
        ParamOp::Length => {
            let len = match &value {
                Value::Multi(items) => items.len(),
                Value::Single(s) => s.chars().count(),
            };
            Ok(Value::Single(len.to_string()))
        }
        ParamOp::Substring { offset, length } => {
            check_nounset(exp, host, is_set)?;
            let off = eval_arith(offset, host)?;
            let len = match length {
                Some(expr) => Some(eval_arith(expr, host)?),
                None => None,
            };
            match &mut value {
                Value::Single(s) => Ok(Value::Single(substring(s, off, len))),
                Value::Multi(items) => Ok(Value::Multi(slice_items(items, off, len))),
            }
        }
        ParamOp::RemovePrefix { pattern, greedy } => {
            check_nounset(exp, host, is_set)?;
            let pat = super::expand_word_pattern(pattern, host)?;
            Ok(map_value(value, |s| strip_prefix_pattern(&s, &pat, *greedy)))
        }
        ParamOp::RemoveSuffix { pattern, greedy } => {
            check_nounset(exp, host, is_set)?;
            let pat = super::expand_word_pattern(pattern, host)?;
            Ok(map_value(value, |s| strip_suffix_pattern(&s, &pat, *greedy)))
        }
        ParamOp::Replace { pattern, replacement, all, anchor } => {
            check_nounset(exp, host, is_set)?;
            let pat = super::expand_word_pattern(pattern, host)?;
            let rep = match replacement {
                Some(w) => super::expand_word_single(w, host)?,
                None => String::new(),
            };
            Ok(map_value(value, |s| replace_pattern(&s, &pat, &rep, *all, *anchor)))
        }
        ParamOp::CaseMod { upper, all } => {
            check_nounset(exp, host, is_set)?;
            Ok(map_value(value, |s| case_modify(&s, *upper, *all)))
        }
        ParamOp::Indirect => {
            let target = match &value {
                Value::Single(s) => s.clone(),
                Value::Multi(items) => items.join(" "),
            };
            if target.is_empty() {
                check_nounset(exp, host, is_set)?;
                return Ok(Value::Single(String::new()));
            }
            match host.get_var(&target) {
                Some(v) => Ok(Value::Single(v)),
                None => {
                    if host.options().nounset {
                        return Err(ExpandError::new(format!("{}: unbound variable", target)));
                    }
                    Ok(Value::Single(String::new()))
                }
            }
        }
    }
}

fn check_nounset(
    exp: &ParamExp,
    host: &mut dyn ExpansionHost,
    is_set: bool,
) -> Result<(), ExpandError> {
    // `$@`/`$*` are exempt: an empty parameter list is not an error.
    if !is_set && host.options().nounset && exp.name != "@" && exp.name != "*" {
        return Err(ExpandError::new(format!("{}: unbound variable", exp.name)));
    }
    Ok(())
}

fn map_value(value: Value, f: impl Fn(String) -> String) -> Value {
    match value {
        Value::Single(s) => Value::Single(f(s)),
        Value::Multi(items) => Value::Multi(items.into_iter().map(f).collect()),
    }
}

// ---------------------------------------------------------------------------
// Operation helpers
// ---------------------------------------------------------------------------

/// `${x:off:len}` in characters; negative offset counts back from the
/// end, negative length is an end offset.
fn substring(s: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let start = if offset < 0 { (n + offset).max(0) } else { offset.min(n) };
    let end = match length {
        None => n,
        Some(len) if len < 0 => (n + len).max(start),
        Some(len) => (start + len).min(n),
    };
    chars[start as usize..end.max(start) as usize].iter().collect()
}

fn slice_items(items: &[String], offset: i64, length: Option<i64>) -> Vec<String> {
    let n = items.len() as i64;
    // Offsets address the positional list one-based.
    let start = if offset < 0 {
        (n + offset).max(0)
    } else {
        (offset - 1).clamp(0, n)
    };
    let end = match length {
        None => n,
        Some(len) if len < 0 => (n + len).max(start),
        Some(len) => (start + len).min(n),
    };
    items[start as usize..end.max(start) as usize].to_vec()
}

fn full_match_regex(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^{}$", glob_to_regex(pattern, true))).ok()
}

fn char_boundaries(s: &str) -> Vec<usize> {
    let mut bounds: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    bounds.push(s.len());
    bounds
}

/// Strip the longest (`##`) or shortest (`#`) matching prefix.
fn strip_prefix_pattern(s: &str, pattern: &str, greedy: bool) -> String {
    let re = match full_match_regex(pattern) {
        Some(re) => re,
        None => return s.to_string(),
    };
    let bounds = char_boundaries(s);
    let candidates: Box<dyn Iterator<Item = &usize>> = if greedy {
        Box::new(bounds.iter().rev())
    } else {
        Box::new(bounds.iter())
    };
    for &i in candidates {
        if re.is_match(&s[..i]) {
            return s[i..].to_string();
        }
    }
    s.to_string()
}

/// Strip the longest (`%%`) or shortest (`%`) matching suffix.
fn strip_suffix_pattern(s: &str, pattern: &str, greedy: bool) -> String {
    let re = match full_match_regex(pattern) {
        Some(re) => re,
        None => return s.to_string(),
    };
    let bounds = char_boundaries(s);
    let candidates: Box<dyn Iterator<Item = &usize>> = if greedy {
        Box::new(bounds.iter())
    } else {
        Box::new(bounds.iter().rev())
    };
    for &i in candidates {
        if re.is_match(&s[i..]) {
            return s[..i].to_string();
        }
    }
    s.to_string()
}

/// `${x/pat/rep}` and friends.
fn replace_pattern(
    s: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
    anchor: Option<ReplaceAnchor>,
) -> String {
    let body = glob_to_regex(pattern, true);
    if body.is_empty() {
        return s.to_string();
    }
    let source = match anchor {
        Some(ReplaceAnchor::Start) => format!("^{}", body),
        Some(ReplaceAnchor::End) => format!("{}$", body),
        None => body,
    };
    let re = match Regex::new(&source) {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let replacement = replacement.replace('$', "$$");
    if all {
        re.replace_all(s, replacement.as_str()).to_string()
    } else {
        re.replace(s, replacement.as_str()).to_string()
    }
}

fn case_modify(s: &str, upper: bool, all: bool) -> String {
    if all {
        if upper {
            s.to_uppercase()
        } else {
            s.to_lowercase()
        }
    } else {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mapped: String = if upper {
                    first.to_uppercase().collect()
                } else {
                    first.to_lowercase().collect()
                };
                format!("{}{}", mapped, chars.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::FakeHost;
    use super::super::{expand_word_fields, ExpandOptions};
    use super::*;
    use crate::parser::{word::parse_word, word::WordMode, Parser};

    fn expand_one(source: &str, host: &mut FakeHost) -> Result<Vec<String>, ExpandError> {
        let mut parser = Parser::new(source);
        let word = parse_word(&mut parser, WordMode::Normal).unwrap();
        expand_word_fields(&word, host)
    }

    fn expand_ok(source: &str, host: &mut FakeHost) -> String {
        expand_one(source, host).unwrap().join("|")
    }

    #[test]
    fn test_default_value() {
        let mut host = FakeHost::new();
        assert_eq!(expand_ok("${x:-fallback}", &mut host), "fallback");
        host.vars.insert("x".into(), "".into());
        assert_eq!(expand_ok("${x:-fallback}", &mut host), "fallback");
        assert_eq!(expand_one("${x-fallback}", &mut host).unwrap(), Vec::<String>::new());
        host.vars.insert("x".into(), "real".into());
        assert_eq!(expand_ok("${x:-fallback}", &mut host), "real");
    }

    #[test]
    fn test_assign_default() {
        let mut host = FakeHost::new();
        assert_eq!(expand_ok("${x:=assigned}", &mut host), "assigned");
        assert_eq!(host.vars.get("x").unwrap(), "assigned");
    }

    #[test]
    fn test_error_if_unset() {
        let mut host = FakeHost::new();
        let err = expand_one("${x:?custom message}", &mut host).unwrap_err();
        assert!(err.message.contains("custom message"));
        let err = expand_one("${x:?}", &mut host).unwrap_err();
        assert!(err.message.contains("parameter null or not set"));
    }

    #[test]
    fn test_alternative() {
        let mut host = FakeHost::new();
        assert_eq!(expand_one("${x:+yes}", &mut host).unwrap(), Vec::<String>::new());
        host.vars.insert("x".into(), "set".into());
        assert_eq!(expand_ok("${x:+yes}", &mut host), "yes");
        host.vars.insert("x".into(), "".into());
        assert_eq!(expand_one("${x:+yes}", &mut host).unwrap(), Vec::<String>::new());
        assert_eq!(expand_ok("${x+yes}", &mut host), "yes");
    }

    #[test]
    fn test_length() {
        let mut host = FakeHost::new();
        host.vars.insert("x".into(), "hello".into());
        assert_eq!(expand_ok("${#x}", &mut host), "5");
        host.arrays.insert("a".into(), vec!["x".into(), "y".into(), "z".into()]);
        assert_eq!(expand_ok("${#a[@]}", &mut host), "3");
    }

    #[test]
    fn test_substring() {
        let mut host = FakeHost::new();
        host.vars.insert("x".into(), "abcdef".into());
        assert_eq!(expand_ok("${x:1:3}", &mut host), "bcd");
        assert_eq!(expand_ok("${x:4}", &mut host), "ef");
        assert_eq!(expand_ok("${x: -2}", &mut host), "ef");
        assert_eq!(expand_ok("${x:1:-2}", &mut host), "bcd");
        assert_eq!(expand_one("${x:9}", &mut host).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_remove_prefix() {
        let mut host = FakeHost::new();
        host.vars.insert("p".into(), "a/b/c.txt".into());
        assert_eq!(expand_ok("${p#*/}", &mut host), "b/c.txt");
        assert_eq!(expand_ok("${p##*/}", &mut host), "c.txt");
    }

    #[test]
    fn test_remove_suffix() {
        let mut host = FakeHost::new();
        host.vars.insert("p".into(), "archive.tar.gz".into());
        assert_eq!(expand_ok("${p%.*}", &mut host), "archive.tar");
        assert_eq!(expand_ok("${p%%.*}", &mut host), "archive");
    }

    #[test]
    fn test_replace() {
        let mut host = FakeHost::new();
        host.vars.insert("x".into(), "one two two".into());
        assert_eq!(expand_ok("${x/two/2}", &mut host), "one|2|two");
        assert_eq!(expand_ok("\"${x/two/2}\"", &mut host), "one 2 two");
        assert_eq!(expand_ok("\"${x//two/2}\"", &mut host), "one 2 2");
        host.vars.insert("y".into(), "aXbXa".into());
        assert_eq!(expand_ok("\"${y/#a/Z}\"", &mut host), "ZXbXa");
        assert_eq!(expand_ok("\"${y/%a/Z}\"", &mut host), "aXbXZ");
        assert_eq!(expand_ok("\"${y/X}\"", &mut host), "abXa");
    }

    #[test]
    fn test_case_modification() {
        let mut host = FakeHost::new();
        host.vars.insert("x".into(), "hello World".into());
        assert_eq!(expand_ok("\"${x^}\"", &mut host), "Hello World");
        assert_eq!(expand_ok("\"${x^^}\"", &mut host), "HELLO WORLD");
        host.vars.insert("y".into(), "HELLO".into());
        assert_eq!(expand_ok("\"${y,}\"", &mut host), "hELLO");
        assert_eq!(expand_ok("\"${y,,}\"", &mut host), "hello");
    }

    #[test]
    fn test_indirect() {
        let mut host = FakeHost::new();
        host.vars.insert("name".into(), "target".into());
        host.vars.insert("target".into(), "value".into());
        assert_eq!(expand_ok("${!name}", &mut host), "value");
    }

    #[test]
    fn test_array_element() {
        let mut host = FakeHost::new();
        host.arrays.insert("a".into(), vec!["x".into(), "y".into()]);
        assert_eq!(expand_ok("${a[1]}", &mut host), "y");
        assert_eq!(expand_ok("\"${a[@]}\"", &mut host), "x|y");
    }

    #[test]
    fn test_positional_slice() {
        let mut host = FakeHost::new();
        host.params = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert_eq!(expand_ok("\"${@:2:2}\"", &mut host), "b|c");
    }

    #[test]
    fn test_nounset() {
        let mut host = FakeHost::new();
        host.options = ExpandOptions { nounset: true, ..Default::default() };
        let err = expand_one("$missing", &mut host).unwrap_err();
        assert!(err.message.contains("unbound variable"));
        // Defaulting operators suppress the error.
        assert_eq!(expand_ok("${missing:-ok}", &mut host), "ok");
        // An empty positional list is fine.
        assert_eq!(expand_one("$@", &mut host).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_substring_helper() {
        assert_eq!(substring("hello", 0, None), "hello");
        assert_eq!(substring("hello", -3, None), "llo");
        assert_eq!(substring("hello", 1, Some(2)), "el");
        assert_eq!(substring("hello", 0, Some(-1)), "hell");
        assert_eq!(substring("hello", 10, None), "");
    }
}
