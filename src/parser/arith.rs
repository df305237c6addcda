//! Arithmetic expression parser.
//!
//! Operates on the raw text captured from `$(( ... ))`, `(( ... ))`,
//! array subscripts, and substring offsets. C operator precedence;
//! values are signed 64-bit.

use crate::ast::{ArithBinOp, ArithExpr, ArithUnaryOp};

/// Parse an arithmetic expression. An empty expression evaluates to 0.
pub fn parse_arith(text: &str) -> Result<ArithExpr, String> {
    let mut p = ArithParser { chars: text.chars().collect(), pos: 0 };
    p.skip_ws();
    if p.at_end() {
        return Ok(ArithExpr::Num(0));
    }
    let expr = p.parse_comma()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(format!(
            "arithmetic syntax error near `{}'",
            p.chars[p.pos..].iter().collect::<String>()
        ));
    }
    Ok(expr)
}

struct ArithParser {
    chars: Vec<char>,
    pos: usize,
}

impl ArithParser {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        if s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c)) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    /// Match `s` only when not followed by any char in `not_before`
    /// (keeps `<` from swallowing `<<` or `<=`).
    fn eat_op(&mut self, s: &str, not_before: &str) -> bool {
        let len = s.chars().count();
        if !s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c)) {
            return false;
        }
        if let Some(next) = self.peek_at(len) {
            if not_before.contains(next) {
                return false;
            }
        }
        self.pos += len;
        true
    }

    // Precedence ladder, lowest first.

    fn parse_comma(&mut self) -> Result<ArithExpr, String> {
        let mut expr = self.parse_assign()?;
        loop {
            self.skip_ws();
            if self.eat(",") {
                let rhs = self.parse_assign()?;
                expr = ArithExpr::Comma(Box::new(expr), Box::new(rhs));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_assign(&mut self) -> Result<ArithExpr, String> {
        self.skip_ws();
        let start = self.pos;
        if let Some(name) = self.try_name() {
            self.skip_ws();
            let op = if self.eat_op("=", "=") {
                Some(None)
            } else if self.eat("+=") {
                Some(Some(ArithBinOp::Add))
            } else if self.eat("-=") {
                Some(Some(ArithBinOp::Sub))
            } else if self.eat("*=") {
                Some(Some(ArithBinOp::Mul))
            } else if self.eat("/=") {
                Some(Some(ArithBinOp::Div))
            } else if self.eat("%=") {
                Some(Some(ArithBinOp::Mod))
            } else if self.eat("<<=") {
                Some(Some(ArithBinOp::Shl))
            } else if self.eat(">>=") {
                Some(Some(ArithBinOp::Shr))
            } else if self.eat("&=") {
                Some(Some(ArithBinOp::BitAnd))
            } else if self.eat("|=") {
                Some(Some(ArithBinOp::BitOr))
            } else if self.eat("^=") {
                Some(Some(ArithBinOp::BitXor))
            } else {
                None
            };
            if let Some(op) = op {
                let value = self.parse_assign()?;
                return Ok(ArithExpr::Assign { name, op, value: Box::new(value) });
            }
        }
        self.pos = start;
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<ArithExpr, String> {
        let cond = self.parse_binary(0)?;
        self.skip_ws();
        if self.eat("?") {
            let then = self.parse_assign()?;
            self.skip_ws();
            if !self.eat(":") {
                return Err("expected `:' in conditional expression".to_string());
            }
            let otherwise = self.parse_assign()?;
            Ok(ArithExpr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
        } else {
            Ok(cond)
        }
    }

    /// Binary operators by precedence level, lowest binding first.
    fn parse_binary(&mut self, level: usize) -> Result<ArithExpr, String> {
        const LEVELS: usize = 10;
        if level >= LEVELS {
            return self.parse_power();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            self.skip_ws();
            let op = match level {
                0 if self.eat("||") => ArithBinOp::LogOr,
                1 if self.eat("&&") => ArithBinOp::LogAnd,
                2 if self.eat_op("|", "|=") => ArithBinOp::BitOr,
                3 if self.eat_op("^", "=") => ArithBinOp::BitXor,
                4 if self.eat_op("&", "&=") => ArithBinOp::BitAnd,
                5 if self.eat("==") => ArithBinOp::Eq,
                5 if self.eat("!=") => ArithBinOp::Ne,
                6 if self.eat("<=") => ArithBinOp::Le,
                6 if self.eat(">=") => ArithBinOp::Ge,
                6 if self.eat_op("<", "<=") => ArithBinOp::Lt,
                6 if self.eat_op(">", ">=") => ArithBinOp::Gt,
                7 if self.eat_op("<<", "=") => ArithBinOp::Shl,
                7 if self.eat_op(">>", "=") => ArithBinOp::Shr,
                8 if self.eat_op("+", "+=") => ArithBinOp::Add,
                8 if self.eat_op("-", "-=") => ArithBinOp::Sub,
                9 if self.eat_op("*", "*=") => ArithBinOp::Mul,
                9 if self.eat_op("/", "=") => ArithBinOp::Div,
                9 if self.eat_op("%", "=") => ArithBinOp::Mod,
                _ => return Ok(lhs),
            };
            let rhs = self.parse_binary(level + 1)?;
            lhs = ArithExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_power(&mut self) -> Result<ArithExpr, String> {
        let base = self.parse_unary()?;
        self.skip_ws();
        if self.eat("**") {
            // Right associative.
            let exp = self.parse_power()?;
            Ok(ArithExpr::Binary(ArithBinOp::Pow, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<ArithExpr, String> {
        self.skip_ws();
        if self.eat("++") {
            self.skip_ws();
            let name = self.try_name().ok_or("`++' requires a variable")?;
            return Ok(ArithExpr::IncDec { name, increment: true, prefix: true });
        }
        if self.eat("--") {
            self.skip_ws();
            let name = self.try_name().ok_or("`--' requires a variable")?;
            return Ok(ArithExpr::IncDec { name, increment: false, prefix: true });
        }
        if self.eat_op("!", "=") {
            return Ok(ArithExpr::Unary(ArithUnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat("~") {
            return Ok(ArithExpr::Unary(ArithUnaryOp::BitNot, Box::new(self.parse_unary()?)));
        }
        if self.eat_op("-", "-=") {
            return Ok(ArithExpr::Unary(ArithUnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.eat_op("+", "+=") {
            return Ok(ArithExpr::Unary(ArithUnaryOp::Pos, Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ArithExpr, String> {
        let primary = self.parse_primary()?;
        self.skip_ws();
        if let ArithExpr::Var(name) = &primary {
            if self.eat("++") {
                return Ok(ArithExpr::IncDec {
                    name: name.clone(),
                    increment: true,
                    prefix: false,
                });
            }
            if self.eat("--") {
                return Ok(ArithExpr::IncDec {
                    name: name.clone(),
                    increment: false,
                    prefix: false,
                });
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<ArithExpr, String> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let expr = self.parse_comma()?;
                self.skip_ws();
                if !self.eat(")") {
                    return Err("expected `)'".to_string());
                }
                Ok(expr)
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('$') => {
                // `$x` and `${x}` read like plain variables here.
                self.pos += 1;
                let braced = self.eat("{");
                let name = self.try_name().ok_or("bad arithmetic variable")?;
                if braced && !self.eat("}") {
                    return Err("expected `}'".to_string());
                }
                self.parse_maybe_subscript(name)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.try_name().unwrap_or_default();
                self.parse_maybe_subscript(name)
            }
            Some(c) => Err(format!("arithmetic syntax error near `{}'", c)),
            None => Err("unexpected end of arithmetic expression".to_string()),
        }
    }

    fn parse_maybe_subscript(&mut self, name: String) -> Result<ArithExpr, String> {
        if self.peek() == Some('[') {
            self.pos += 1;
            let index = self.parse_comma()?;
            self.skip_ws();
            if !self.eat("]") {
                return Err("expected `]'".to_string());
            }
            Ok(ArithExpr::Elem(name, Box::new(index)))
        } else {
            Ok(ArithExpr::Var(name))
        }
    }

    fn parse_number(&mut self) -> Result<ArithExpr, String> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '#' {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        parse_int_literal(&text)
            .map(ArithExpr::Num)
            .ok_or_else(|| format!("invalid arithmetic number `{}'", text))
    }

    fn try_name(&mut self) -> Option<String> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Some(name)
    }
}

/// `0x` hex, leading-zero octal, `base#value`, otherwise decimal.
pub fn parse_int_literal(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some((base, digits)) = text.split_once('#') {
        let base: u32 = base.parse().ok()?;
        if !(2..=36).contains(&base) {
            return None;
        }
        return i64::from_str_radix(digits, base).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_is_zero() {
        assert_eq!(parse_arith("").unwrap(), ArithExpr::Num(0));
        assert_eq!(parse_arith("   ").unwrap(), ArithExpr::Num(0));
    }

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0x1f"), Some(31));
        assert_eq!(parse_int_literal("010"), Some(8));
        assert_eq!(parse_int_literal("2#101"), Some(5));
        assert_eq!(parse_int_literal("16#ff"), Some(255));
        assert_eq!(parse_int_literal("37#1"), None);
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        match parse_arith("1 + 2 * 3").unwrap() {
            ArithExpr::Binary(ArithBinOp::Add, lhs, rhs) => {
                assert_eq!(*lhs, ArithExpr::Num(1));
                assert!(matches!(*rhs, ArithExpr::Binary(ArithBinOp::Mul, _, _)));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_comparison_and_shift() {
        assert!(matches!(
            parse_arith("1 << 2").unwrap(),
            ArithExpr::Binary(ArithBinOp::Shl, _, _)
        ));
        assert!(matches!(
            parse_arith("x <= 5").unwrap(),
            ArithExpr::Binary(ArithBinOp::Le, _, _)
        ));
        assert!(matches!(
            parse_arith("x < 5").unwrap(),
            ArithExpr::Binary(ArithBinOp::Lt, _, _)
        ));
    }

    #[test]
    fn test_logical_ops() {
        assert!(matches!(
            parse_arith("a && b || c").unwrap(),
            ArithExpr::Binary(ArithBinOp::LogOr, _, _)
        ));
    }

    #[test]
    fn test_assignment() {
        match parse_arith("x = 5").unwrap() {
            ArithExpr::Assign { name, op, .. } => {
                assert_eq!(name, "x");
                assert!(op.is_none());
            }
            other => panic!("unexpected parse: {:?}", other),
        }
        match parse_arith("x += 2").unwrap() {
            ArithExpr::Assign { op: Some(ArithBinOp::Add), .. } => {}
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_equality_is_not_assignment() {
        assert!(matches!(
            parse_arith("x == 5").unwrap(),
            ArithExpr::Binary(ArithBinOp::Eq, _, _)
        ));
    }

    #[test]
    fn test_inc_dec() {
        assert_eq!(
            parse_arith("i++").unwrap(),
            ArithExpr::IncDec { name: "i".into(), increment: true, prefix: false }
        );
        assert_eq!(
            parse_arith("--i").unwrap(),
            ArithExpr::IncDec { name: "i".into(), increment: false, prefix: true }
        );
    }

    #[test]
    fn test_ternary() {
        assert!(matches!(
            parse_arith("a ? 1 : 2").unwrap(),
            ArithExpr::Ternary(_, _, _)
        ));
    }

    #[test]
    fn test_power_right_assoc() {
        // 2 ** 3 ** 2 parses as 2 ** (3 ** 2)
        match parse_arith("2 ** 3 ** 2").unwrap() {
            ArithExpr::Binary(ArithBinOp::Pow, _, rhs) => {
                assert!(matches!(*rhs, ArithExpr::Binary(ArithBinOp::Pow, _, _)));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_dollar_variables() {
        assert_eq!(parse_arith("$x + 1").unwrap(),
            ArithExpr::Binary(
                ArithBinOp::Add,
                Box::new(ArithExpr::Var("x".into())),
                Box::new(ArithExpr::Num(1))
            ));
        assert!(matches!(parse_arith("${x}").unwrap(), ArithExpr::Var(_)));
    }

    #[test]
    fn test_array_element() {
        assert!(matches!(
            parse_arith("a[i+1]").unwrap(),
            ArithExpr::Elem(_, _)
        ));
    }

    #[test]
    fn test_comma() {
        assert!(matches!(parse_arith("1, 2").unwrap(), ArithExpr::Comma(_, _)));
    }

    #[test]
    fn test_parens() {
        match parse_arith("(1 + 2) * 3").unwrap() {
            ArithExpr::Binary(ArithBinOp::Mul, lhs, _) => {
                assert!(matches!(*lhs, ArithExpr::Binary(ArithBinOp::Add, _, _)));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_arith("1 +").is_err());
        assert!(parse_arith("(1").is_err());
        assert!(parse_arith("1 2").is_err());
    }
}
