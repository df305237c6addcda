//! Shell glob patterns compiled to regexes.
//!
//! Used by `case`, `[[ == ]]`, and the `${x#pat}` / `${x/pat/rep}`
//! family. `*` maps to greedy or lazy `.*` depending on the operator,
//! `?` to `.`, bracket classes carry over, and a backslash quotes the
//! next character.

use regex_lite::Regex;

/// Translate a glob pattern into regex source (no anchors).
pub fn glob_to_regex(pattern: &str, greedy: bool) -> String {
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => out.push_str(if greedy { ".*" } else { ".*?" }),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; `]` first in the class is
                // literal, as is the whole class when unterminated.
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') || chars.get(j) == Some(&'^') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j < chars.len() {
                    out.push('[');
                    let mut k = i + 1;
                    if chars.get(k) == Some(&'!') || chars.get(k) == Some(&'^') {
                        out.push('^');
                        k += 1;
                    }
                    while k < j {
                        let cc = chars[k];
                        if cc == '\\' {
                            out.push_str("\\\\");
                        } else {
                            out.push(cc);
                        }
                        k += 1;
                    }
                    out.push(']');
                    i = j;
                } else {
                    out.push_str("\\[");
                }
            }
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some(&next) => push_literal(&mut out, next),
                    None => out.push_str("\\\\"),
                }
            }
            other => push_literal(&mut out, other),
        }
        i += 1;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if ".^$*+?()[]{}|\\".contains(c) {
        out.push('\\');
    }
    out.push(c);
}

/// Full-string glob match (anchored both ends).
pub fn matches_glob(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let mut source = format!("^{}$", glob_to_regex(pattern, true));
    if case_insensitive {
        source = format!("(?i){}", source);
    }
    match Regex::new(&source) {
        Ok(re) => re.is_match(text),
        Err(_) => pattern == text,
    }
}

/// Does the text contain unescaped glob metacharacters?
pub fn has_glob_chars(text: &str) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

/// Strip backslash escapes, yielding the literal text a non-matching
/// glob falls back to.
pub fn unescape(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape glob metacharacters so a pattern fragment matches literally.
pub fn escape_glob(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if "*?[]\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        assert!(matches_glob("*.txt", "notes.txt", false));
        assert!(!matches_glob("*.txt", "notes.md", false));
        assert!(matches_glob("a?c", "abc", false));
        assert!(!matches_glob("a?c", "abbc", false));
    }

    #[test]
    fn test_star_crosses_everything() {
        assert!(matches_glob("*", "", false));
        assert!(matches_glob("*", "anything at all", false));
        assert!(matches_glob("a*b*c", "a-x-b-y-c", false));
    }

    #[test]
    fn test_bracket_classes() {
        assert!(matches_glob("[abc]", "b", false));
        assert!(!matches_glob("[abc]", "d", false));
        assert!(matches_glob("[a-z]x", "mx", false));
        assert!(matches_glob("[!abc]", "d", false));
        assert!(!matches_glob("[!abc]", "a", false));
    }

    #[test]
    fn test_unterminated_bracket_is_literal() {
        assert!(matches_glob("a[b", "a[b", false));
        assert!(!matches_glob("a[b", "ab", false));
    }

    #[test]
    fn test_escaped_metachars() {
        assert!(matches_glob("\\*", "*", false));
        assert!(!matches_glob("\\*", "x", false));
        assert!(matches_glob("a\\?b", "a?b", false));
    }

    #[test]
    fn test_regex_metachars_in_glob() {
        assert!(matches_glob("a.b", "a.b", false));
        assert!(!matches_glob("a.b", "axb", false));
        assert!(matches_glob("(x)*", "(x)y", false));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_glob("ab*", "ABC", true));
        assert!(!matches_glob("ab*", "ABC", false));
    }

    #[test]
    fn test_lazy_conversion() {
        assert_eq!(glob_to_regex("a*", false), "a.*?");
        assert_eq!(glob_to_regex("a*", true), "a.*");
    }

    #[test]
    fn test_has_glob_chars() {
        assert!(has_glob_chars("*.rs"));
        assert!(has_glob_chars("a?b"));
        assert!(has_glob_chars("x[0-9]"));
        assert!(!has_glob_chars("plain"));
        assert!(!has_glob_chars("esc\\*aped"));
    }

    #[test]
    fn test_unescape_and_escape() {
        assert_eq!(unescape("a\\*b"), "a*b");
        assert_eq!(escape_glob("a*b"), "a\\*b");
        assert_eq!(unescape(&escape_glob("x[1]?*")), "x[1]?*");
    }
}
