//! The word expansion pipeline.
//!
//! Fixed stage order: brace expansion, then left-to-right part expansion
//! (parameters, command substitution, arithmetic, tilde), then IFS word
//! splitting on unquoted expansion results, then pathname expansion,
//! with quote removal falling out of how parts carry their quoting.
//!
//! The expander reaches its surroundings only through [`ExpansionHost`],
//! a capability bundle the interpreter implements; nothing here imports
//! interpreter types.

pub mod arith;
pub mod brace;
pub mod param;
pub mod pattern;

use crate::ast::{Script, Word, WordPart};

/// Failure during expansion; aborts the current simple command.
#[derive(Debug, Clone)]
pub struct ExpandError {
    pub message: String,
    pub exit_code: i32,
}

impl ExpandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), exit_code: 1 }
    }
}

impl std::fmt::Display for ExpandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExpandError {}

/// Shell options the expander consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions {
    pub nounset: bool,
    pub noglob: bool,
    pub nullglob: bool,
    pub failglob: bool,
    pub nocasematch: bool,
}

/// Everything the expander may ask of its surroundings.
pub trait ExpansionHost {
    /// Scalar lookup: variables, positionals by digit name, and the
    /// special parameters (`?`, `$`, `!`, `#`, `-`, `0`).
    fn get_var(&mut self, name: &str) -> Option<String>;

    fn set_var(&mut self, name: &str, value: &str);

    fn var_is_set(&mut self, name: &str) -> bool {
        self.get_var(name).is_some()
    }

    /// Array values in index order; None when no such array.
    fn array_items(&mut self, name: &str) -> Option<Vec<String>>;

    fn array_item_at(&mut self, name: &str, index: i64) -> Option<String>;

    fn positionals(&mut self) -> Vec<String>;

    fn ifs(&mut self) -> String {
        " \t\n".to_string()
    }

    fn options(&self) -> ExpandOptions;

    /// Run a command substitution body, returning its stdout. The host
    /// records the exit code in `$?` itself.
    fn run_substitution(&mut self, script: &Script) -> String;

    fn home_dir(&mut self, user: Option<&str>) -> Option<String>;

    /// Pathname expansion for one pattern, sorted.
    fn glob(&mut self, pattern: &str) -> Vec<String>;
}

/// Expand a word list into argv fields: the full pipeline.
pub fn expand_words(
    words: &[Word],
    host: &mut dyn ExpansionHost,
) -> Result<Vec<String>, ExpandError> {
    let mut fields = Vec::new();
    for word in words {
        fields.extend(expand_word_fields(word, host)?);
    }
    Ok(fields)
}

/// Expand one word into zero or more fields.
pub fn expand_word_fields(
    word: &Word,
    host: &mut dyn ExpansionHost,
) -> Result<Vec<String>, ExpandError> {
    let mut out = Vec::new();
    for braced in brace::expand_braces(word) {
        let mut asm = FieldAssembler::new(host.ifs());
        expand_parts(&braced.parts, host, false, &mut asm)?;
        out.extend(glob_stage(asm.finish(), host)?);
    }
    Ok(out)
}

/// Expand a word to a single string: no brace multiplication, no
/// splitting, no globbing. Used for assignment values, redirection
/// here-strings, case subjects, and `[[ ]]` operands.
pub fn expand_word_single(
    word: &Word,
    host: &mut dyn ExpansionHost,
) -> Result<String, ExpandError> {
    let mut asm = FieldAssembler::new(String::new());
    expand_parts(&word.parts, host, false, &mut asm)?;
    let fields = asm.finish();
    Ok(fields
        .into_iter()
        .map(|pieces| pieces.into_iter().map(|(t, _)| t).collect::<String>())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Expand a word into a glob/match pattern: quoted characters come out
/// backslash-escaped so pattern matching treats them literally.
pub fn expand_word_pattern(
    word: &Word,
    host: &mut dyn ExpansionHost,
) -> Result<String, ExpandError> {
    let mut asm = FieldAssembler::new(String::new());
    expand_parts(&word.parts, host, false, &mut asm)?;
    let mut out = String::new();
    for pieces in asm.finish() {
        for (text, active) in pieces {
            if active {
                out.push_str(&text);
            } else {
                out.push_str(&pattern::escape_glob(&text));
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Field assembly
// ---------------------------------------------------------------------------

/// A field under construction: (text, glob-active) pieces.
type Pieces = Vec<(String, bool)>;

pub(crate) struct FieldAssembler {
    ifs: String,
    fields: Vec<Pieces>,
    current: Pieces,
    touched: bool,
    pending_break: bool,
}

impl FieldAssembler {
    fn new(ifs: String) -> Self {
        Self {
            ifs,
            fields: Vec::new(),
            current: Vec::new(),
            touched: false,
            pending_break: false,
        }
    }

    fn take_pending(&mut self) {
        if self.pending_break {
            self.break_field();
        }
    }

    fn break_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.current));
        self.touched = false;
        self.pending_break = false;
    }

    /// Unquoted literal text: no splitting, glob characters active.
    fn push_raw(&mut self, text: &str) {
        self.take_pending();
        self.current.push((text.to_string(), true));
        self.touched = true;
    }

    /// Quoted text: inert for splitting and globbing.
    fn push_quoted(&mut self, text: &str) {
        self.take_pending();
        self.current.push((text.to_string(), false));
        self.touched = true;
    }

    /// Quoted multi-value expansion (`"$@"`): one field per element,
    /// vanishing entirely when there are no elements.
    fn push_quoted_list(&mut self, items: &[String]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.break_field();
            }
            self.push_quoted(item);
        }
    }

    /// Unquoted expansion result: subject to IFS splitting and globbing.
    fn push_expanded(&mut self, text: &str) {
        let ifs = self.ifs.clone();
        if ifs.is_empty() {
            self.take_pending();
            self.current.push((text.to_string(), true));
            self.touched = true;
            return;
        }
        let is_ifs = |c: char| ifs.contains(c);
        let is_ws_ifs = |c: char| is_ifs(c) && c.is_whitespace();
        let mut chunk = String::new();
        for c in text.chars() {
            if is_ws_ifs(c) {
                if !chunk.is_empty() {
                    self.take_pending();
                    self.current.push((std::mem::take(&mut chunk), true));
                    self.touched = true;
                }
                if self.touched {
                    self.pending_break = true;
                }
            } else if is_ifs(c) {
                if !chunk.is_empty() {
                    self.take_pending();
                    self.current.push((std::mem::take(&mut chunk), true));
                    self.touched = true;
                }
                // A non-whitespace separator always delimits, which can
                // produce empty fields.
                self.pending_break = false;
                self.break_field();
            } else {
                chunk.push(c);
            }
        }
        if !chunk.is_empty() {
            self.take_pending();
            self.current.push((chunk, true));
            self.touched = true;
        }
    }

    fn finish(mut self) -> Vec<Pieces> {
        if self.touched {
            self.fields.push(self.current);
        }
        self.fields
    }
}

// ---------------------------------------------------------------------------
// Part expansion
// ---------------------------------------------------------------------------

fn expand_parts(
    parts: &[WordPart],
    host: &mut dyn ExpansionHost,
    quoted: bool,
    asm: &mut FieldAssembler,
) -> Result<(), ExpandError> {
    for part in parts {
        match part {
            WordPart::Literal(text) => {
                if quoted {
                    asm.push_quoted(text);
                } else {
                    asm.push_raw(text);
                }
            }
            WordPart::Glob(text) => {
                if quoted {
                    asm.push_quoted(text);
                } else {
                    asm.push_raw(text);
                }
            }
            WordPart::SingleQuoted(text) => asm.push_quoted(text),
            WordPart::Escaped(c) => asm.push_quoted(&c.to_string()),
            WordPart::DoubleQuoted(inner) => expand_parts(inner, host, true, asm)?,
            WordPart::Param(exp) => param::expand_param_into(exp, host, quoted, asm)?,
            WordPart::CommandSubst(script) => {
                let output = host.run_substitution(script);
                let trimmed = output.trim_end_matches('\n');
                if quoted {
                    asm.push_quoted(trimmed);
                } else {
                    asm.push_expanded(trimmed);
                }
            }
            WordPart::Arith(expr) => {
                let value = arith::eval_arith(expr, host)?;
                if quoted {
                    asm.push_quoted(&value.to_string());
                } else {
                    asm.push_expanded(&value.to_string());
                }
            }
            WordPart::ProcessSubst { script, output } => {
                // Fixed fd placeholder; the substituted command is not run.
                let _ = (script, output);
                asm.push_quoted("/dev/fd/63");
            }
            WordPart::Tilde(user) => {
                match host.home_dir(user.as_deref()) {
                    Some(home) => asm.push_quoted(&home),
                    None => {
                        let text = match user {
                            Some(u) => format!("~{}", u),
                            None => "~".to_string(),
                        };
                        asm.push_quoted(&text);
                    }
                }
            }
            WordPart::Brace(items) => {
                // Brace parts only reach this stage through the
                // no-multiplication entry points; render the source form.
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        crate::ast::BraceItem::Word(w) => w.static_text().unwrap_or_default(),
                        crate::ast::BraceItem::Range { start, end, .. } => {
                            let fmt = |e: &crate::ast::RangeEnd| match e {
                                crate::ast::RangeEnd::Int(n) => n.to_string(),
                                crate::ast::RangeEnd::Char(c) => c.to_string(),
                            };
                            format!("{}..{}", fmt(start), fmt(end))
                        }
                    })
                    .collect();
                asm.push_raw(&format!("{{{}}}", rendered.join(",")));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pathname expansion
// ---------------------------------------------------------------------------

fn glob_stage(
    fields: Vec<Pieces>,
    host: &mut dyn ExpansionHost,
) -> Result<Vec<String>, ExpandError> {
    let options = host.options();
    let mut out = Vec::new();
    for pieces in fields {
        let plain: String = pieces.iter().map(|(t, _)| t.as_str()).collect();
        let has_active = !options.noglob
            && pieces
                .iter()
                .any(|(t, active)| *active && pattern::has_glob_chars(t));
        if !has_active {
            out.push(plain);
            continue;
        }
        let glob_pattern: String = pieces
            .iter()
            .map(|(t, active)| {
                if *active {
                    t.clone()
                } else {
                    pattern::escape_glob(t)
                }
            })
            .collect();
        let matches = host.glob(&glob_pattern);
        if !matches.is_empty() {
            out.extend(matches);
        } else if options.failglob {
            return Err(ExpandError::new(format!("no match: {}", plain)));
        } else if options.nullglob {
            // Field drops entirely.
        } else {
            out.push(plain);
        }
    }
    Ok(out)
}
