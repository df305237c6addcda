//! Syntax tree for the shell language.
//!
//! Every construct the interpreter executes is a tagged variant here.
//! The parser is the only producer; the interpreter and the expander are
//! the only consumers.

/// A complete script: the root of every parse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

/// One and-or list, optionally sent to the background with `&`.
///
/// `first` runs unconditionally; each entry in `rest` runs depending on
/// the exit code of whatever ran before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub first: Pipeline,
    pub rest: Vec<(AndOr, Pipeline)>,
    pub background: bool,
}

impl Statement {
    pub fn single(pipeline: Pipeline) -> Self {
        Self { first: pipeline, rest: Vec::new(), background: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOr {
    /// `&&`: run iff the previous command succeeded.
    And,
    /// `||`: run iff the previous command failed.
    Or,
}

/// Commands joined by `|` or `|&`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Leading `!` inverts the final exit code.
    pub negated: bool,
    pub elements: Vec<PipeElement>,
}

impl Pipeline {
    pub fn single(command: Command) -> Self {
        Self {
            negated: false,
            elements: vec![PipeElement { command, stderr_piped: false }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeElement {
    pub command: Command,
    /// True when this element is connected to its predecessor by `|&`
    /// (the predecessor's stderr joins the pipe). Always false for the
    /// first element.
    pub stderr_piped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Compound(CompoundCommand, Vec<Redirect>),
    FunctionDef(FunctionDef),
}

/// `VAR=x cmd arg >out`: assignments, argv words, redirections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommand {
    If {
        /// (condition, body) for `if` and each `elif`.
        clauses: Vec<(Vec<Statement>, Vec<Statement>)>,
        else_body: Option<Vec<Statement>>,
    },
    For {
        var: String,
        /// None iterates over `"$@"`.
        words: Option<Vec<Word>>,
        body: Vec<Statement>,
    },
    ForArith {
        init: Option<ArithExpr>,
        cond: Option<ArithExpr>,
        step: Option<ArithExpr>,
        body: Vec<Statement>,
    },
    While {
        cond: Vec<Statement>,
        body: Vec<Statement>,
    },
    Until {
        cond: Vec<Statement>,
        body: Vec<Statement>,
    },
    Case {
        word: Word,
        items: Vec<CaseItem>,
    },
    /// `( ... )`: runs against a snapshot; mutations are discarded.
    Subshell(Vec<Statement>),
    /// `{ ...; }`: runs in the current environment.
    Group(Vec<Statement>),
    /// `(( expr ))`: exit 0 iff the value is non-zero.
    Arith(ArithExpr),
    /// `[[ expr ]]`
    Cond(CondExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub body: Vec<Statement>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    /// `;;` stop after this item.
    Break,
    /// `;&` fall through into the next body without matching.
    FallThrough,
    /// `;;&` keep testing the remaining patterns.
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<Command>,
}

/// `NAME=value`, `NAME+=value`, `NAME[idx]=value` or `NAME=(a b c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    /// Raw subscript text for `NAME[idx]=`, evaluated arithmetically.
    pub index: Option<String>,
    pub append: bool,
    pub value: Option<Word>,
    pub array: Option<Vec<Word>>,
}

// ---------------------------------------------------------------------------
// Redirections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Explicit fd (`2>`); None takes the operator's default.
    pub fd: Option<i32>,
    pub op: RedirectOp,
    pub target: RedirectTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `< file`
    In,
    /// `> file`
    Out,
    /// `>> file`
    Append,
    /// `&> file`
    OutErr,
    /// `&>> file`
    AppendErr,
    /// `n>&m`
    DupOut,
    /// `n<&m`
    DupIn,
    /// `<<< word`
    HereString,
    /// `<< tag` / `<<- tag`
    HereDoc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectTarget {
    Word(Word),
    HereDoc {
        /// Body as a word: a single Literal when the delimiter was quoted,
        /// otherwise literal text interleaved with expansions.
        body: Word,
        strip_tabs: bool,
        quoted: bool,
    },
}

// ---------------------------------------------------------------------------
// Words
// ---------------------------------------------------------------------------

/// An unexpanded shell word: an ordered run of parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self { parts: vec![WordPart::Literal(text.into())] }
    }

    /// True when every part is literal-like, i.e. expansion is identity.
    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|p| {
            matches!(
                p,
                WordPart::Literal(_) | WordPart::SingleQuoted(_) | WordPart::Escaped(_)
            )
        })
    }

    /// The literal text of a static word (used for assignment names,
    /// function names, case patterns shown in errors).
    pub fn static_text(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Literal(s) | WordPart::SingleQuoted(s) => out.push_str(s),
                WordPart::Escaped(c) => out.push(*c),
                _ => return None,
            }
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    Literal(String),
    /// Unquoted text containing glob metacharacters (`*`, `?`, `[`).
    Glob(String),
    SingleQuoted(String),
    DoubleQuoted(Vec<WordPart>),
    Escaped(char),
    Param(ParamExp),
    CommandSubst(Script),
    Arith(ArithExpr),
    /// `<(cmd)` / `>(cmd)`. Expansion yields a fixed fd placeholder.
    ProcessSubst { script: Script, output: bool },
    Tilde(Option<String>),
    Brace(Vec<BraceItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BraceItem {
    Word(Word),
    Range {
        start: RangeEnd,
        end: RangeEnd,
        step: Option<i64>,
        /// Zero-padded width when the endpoints were written with leading
        /// zeros, e.g. `{01..10}`.
        width: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Int(i64),
    Char(char),
}

// ---------------------------------------------------------------------------
// Parameter expansion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ParamExp {
    pub name: String,
    pub index: Option<ParamIndex>,
    pub op: Option<ParamOp>,
}

impl ParamExp {
    pub fn plain(name: impl Into<String>) -> Self {
        Self { name: name.into(), index: None, op: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamIndex {
    /// `[@]`: each element its own field inside quotes.
    At,
    /// `[*]`: elements joined on the first IFS character.
    Star,
    /// Any other subscript, evaluated as arithmetic.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamOp {
    /// `${x:-w}` / `${x-w}`
    Default { word: Word, colon: bool },
    /// `${x:=w}` / `${x=w}`
    Assign { word: Word, colon: bool },
    /// `${x:?w}` / `${x?w}`
    Error { word: Option<Word>, colon: bool },
    /// `${x:+w}` / `${x+w}`
    Alternative { word: Word, colon: bool },
    /// `${#x}`
    Length,
    /// `${x:off}` / `${x:off:len}`
    Substring { offset: ArithExpr, length: Option<ArithExpr> },
    /// `${x#p}` / `${x##p}`
    RemovePrefix { pattern: Word, greedy: bool },
    /// `${x%p}` / `${x%%p}`
    RemoveSuffix { pattern: Word, greedy: bool },
    /// `${x/p/r}` and the `//`, `/#`, `/%` forms.
    Replace {
        pattern: Word,
        replacement: Option<Word>,
        all: bool,
        anchor: Option<ReplaceAnchor>,
    },
    /// `${x^}`, `${x^^}`, `${x,}`, `${x,,}`
    CaseMod { upper: bool, all: bool },
    /// `${!x}`
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceAnchor {
    Start,
    End,
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Num(i64),
    Var(String),
    /// `arr[idx]`
    Elem(String, Box<ArithExpr>),
    Unary(ArithUnaryOp, Box<ArithExpr>),
    /// `x++`, `--x` and friends; side-effects through the host.
    IncDec { name: String, increment: bool, prefix: bool },
    Binary(ArithBinOp, Box<ArithExpr>, Box<ArithExpr>),
    Ternary(Box<ArithExpr>, Box<ArithExpr>, Box<ArithExpr>),
    Assign { name: String, op: Option<ArithBinOp>, value: Box<ArithExpr> },
    Comma(Box<ArithExpr>, Box<ArithExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
}

// ---------------------------------------------------------------------------
// [[ ]] conditional expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    /// `-f x`, `-z x`, ...: operator keeps its source spelling.
    Unary { op: String, operand: Word },
    /// `a == b`, `a =~ re`, `a -lt b`, ...
    Binary { op: String, lhs: Word, rhs: Word },
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
    /// Bare word: true iff it expands non-empty.
    Word(Word),
}
