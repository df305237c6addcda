//! Arithmetic evaluation over the expansion host.
//!
//! Variables read as base-10 integers with non-numeric values counting
//! as 0. Division by zero yields 0 rather than failing. `++`/`--` and
//! assignments write back through the host.

use super::{ExpandError, ExpansionHost};
use crate::ast::{ArithBinOp, ArithExpr, ArithUnaryOp};
use crate::parser::arith::parse_int_literal;

pub fn eval_arith(
    expr: &ArithExpr,
    host: &mut dyn ExpansionHost,
) -> Result<i64, ExpandError> {
    match expr {
        ArithExpr::Num(n) => Ok(*n),
        ArithExpr::Var(name) => Ok(read_numeric(host, name)),
        ArithExpr::Elem(name, index) => {
            let idx = eval_arith(index, host)?;
            Ok(host
                .array_item_at(name, idx)
                .as_deref()
                .map(to_number)
                .unwrap_or(0))
        }
        ArithExpr::Unary(op, operand) => {
            let v = eval_arith(operand, host)?;
            Ok(match op {
                ArithUnaryOp::Neg => v.wrapping_neg(),
                ArithUnaryOp::Pos => v,
                ArithUnaryOp::Not => i64::from(v == 0),
                ArithUnaryOp::BitNot => !v,
            })
        }
        ArithExpr::IncDec { name, increment, prefix } => {
            let old = read_numeric(host, name);
            let new = if *increment { old.wrapping_add(1) } else { old.wrapping_sub(1) };
            host.set_var(name, &new.to_string());
            Ok(if *prefix { new } else { old })
        }
        ArithExpr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, host),
        ArithExpr::Ternary(cond, then, otherwise) => {
            if eval_arith(cond, host)? != 0 {
                eval_arith(then, host)
            } else {
                eval_arith(otherwise, host)
            }
        }
        ArithExpr::Assign { name, op, value } => {
            let rhs = eval_arith(value, host)?;
            let result = match op {
                None => rhs,
                Some(binop) => apply_binop(*binop, read_numeric(host, name), rhs),
            };
            host.set_var(name, &result.to_string());
            Ok(result)
        }
        ArithExpr::Comma(lhs, rhs) => {
            eval_arith(lhs, host)?;
            eval_arith(rhs, host)
        }
    }
}

fn eval_binary(
    op: ArithBinOp,
    lhs: &ArithExpr,
    rhs: &ArithExpr,
    host: &mut dyn ExpansionHost,
) -> Result<i64, ExpandError> {
    // Logical operators short-circuit; everything else is strict.
    match op {
        ArithBinOp::LogAnd => {
            if eval_arith(lhs, host)? == 0 {
                return Ok(0);
            }
            return Ok(i64::from(eval_arith(rhs, host)? != 0));
        }
        ArithBinOp::LogOr => {
            if eval_arith(lhs, host)? != 0 {
                return Ok(1);
            }
            return Ok(i64::from(eval_arith(rhs, host)? != 0));
        }
        _ => {}
    }
    let a = eval_arith(lhs, host)?;
    let b = eval_arith(rhs, host)?;
    Ok(apply_binop(op, a, b))
}

fn apply_binop(op: ArithBinOp, a: i64, b: i64) -> i64 {
    match op {
        ArithBinOp::Add => a.wrapping_add(b),
        ArithBinOp::Sub => a.wrapping_sub(b),
        ArithBinOp::Mul => a.wrapping_mul(b),
        ArithBinOp::Div => {
            if b == 0 {
                0
            } else {
                a.wrapping_div(b)
            }
        }
        ArithBinOp::Mod => {
            if b == 0 {
                0
            } else {
                a.wrapping_rem(b)
            }
        }
        ArithBinOp::Pow => {
            if b < 0 {
                0
            } else {
                u32::try_from(b)
                    .ok()
                    .map(|e| a.wrapping_pow(e))
                    .unwrap_or(0)
            }
        }
        ArithBinOp::Shl => a.wrapping_shl(b as u32),
        ArithBinOp::Shr => a.wrapping_shr(b as u32),
        ArithBinOp::Lt => i64::from(a < b),
        ArithBinOp::Le => i64::from(a <= b),
        ArithBinOp::Gt => i64::from(a > b),
        ArithBinOp::Ge => i64::from(a >= b),
        ArithBinOp::Eq => i64::from(a == b),
        ArithBinOp::Ne => i64::from(a != b),
        ArithBinOp::BitAnd => a & b,
        ArithBinOp::BitOr => a | b,
        ArithBinOp::BitXor => a ^ b,
        ArithBinOp::LogAnd | ArithBinOp::LogOr => unreachable!("short-circuited"),
    }
}

fn read_numeric(host: &mut dyn ExpansionHost, name: &str) -> i64 {
    host.get_var(name).as_deref().map(to_number).unwrap_or(0)
}

fn to_number(text: &str) -> i64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    if let Some(rest) = trimmed.strip_prefix('-') {
        return parse_int_literal(rest).map(|v| -v).unwrap_or(0);
    }
    parse_int_literal(trimmed).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::tests::FakeHost;
    use super::*;
    use crate::parser::arith::parse_arith;

    fn eval(text: &str, host: &mut FakeHost) -> i64 {
        eval_arith(&parse_arith(text).unwrap(), host).unwrap()
    }

    #[test]
    fn test_basic_math() {
        let mut host = FakeHost::new();
        assert_eq!(eval("1 + 2 * 3", &mut host), 7);
        assert_eq!(eval("(1 + 2) * 3", &mut host), 9);
        assert_eq!(eval("7 % 3", &mut host), 1);
        assert_eq!(eval("2 ** 10", &mut host), 1024);
        assert_eq!(eval("-5 + 3", &mut host), -2);
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        let mut host = FakeHost::new();
        assert_eq!(eval("5 / 0", &mut host), 0);
        assert_eq!(eval("5 % 0", &mut host), 0);
    }

    #[test]
    fn test_variables_read_as_numbers() {
        let mut host = FakeHost::new();
        host.vars.insert("n".into(), "12".into());
        assert_eq!(eval("n + 1", &mut host), 13);
        host.vars.insert("junk".into(), "not-a-number".into());
        assert_eq!(eval("junk + 1", &mut host), 1);
        assert_eq!(eval("undefined + 1", &mut host), 1);
    }

    #[test]
    fn test_comparisons_and_logic() {
        let mut host = FakeHost::new();
        assert_eq!(eval("3 < 5", &mut host), 1);
        assert_eq!(eval("3 >= 5", &mut host), 0);
        assert_eq!(eval("1 && 2", &mut host), 1);
        assert_eq!(eval("0 || 3", &mut host), 1);
        assert_eq!(eval("0 && (1 / 0)", &mut host), 0);
    }

    #[test]
    fn test_bitwise_and_shift() {
        let mut host = FakeHost::new();
        assert_eq!(eval("6 & 3", &mut host), 2);
        assert_eq!(eval("6 | 3", &mut host), 7);
        assert_eq!(eval("6 ^ 3", &mut host), 5);
        assert_eq!(eval("~0", &mut host), -1);
        assert_eq!(eval("1 << 4", &mut host), 16);
        assert_eq!(eval("16 >> 2", &mut host), 4);
    }

    #[test]
    fn test_assignment_writes_back() {
        let mut host = FakeHost::new();
        assert_eq!(eval("x = 5", &mut host), 5);
        assert_eq!(host.vars.get("x").unwrap(), "5");
        assert_eq!(eval("x += 3", &mut host), 8);
        assert_eq!(host.vars.get("x").unwrap(), "8");
    }

    #[test]
    fn test_inc_dec_side_effects() {
        let mut host = FakeHost::new();
        host.vars.insert("i".into(), "5".into());
        assert_eq!(eval("i++", &mut host), 5);
        assert_eq!(host.vars.get("i").unwrap(), "6");
        assert_eq!(eval("++i", &mut host), 7);
        assert_eq!(eval("--i", &mut host), 6);
        assert_eq!(eval("i--", &mut host), 6);
        assert_eq!(host.vars.get("i").unwrap(), "5");
    }

    #[test]
    fn test_ternary_and_comma() {
        let mut host = FakeHost::new();
        assert_eq!(eval("1 ? 10 : 20", &mut host), 10);
        assert_eq!(eval("0 ? 10 : 20", &mut host), 20);
        assert_eq!(eval("1 + 1, 5", &mut host), 5);
    }

    #[test]
    fn test_array_elements() {
        let mut host = FakeHost::new();
        host.arrays.insert("a".into(), vec!["10".into(), "20".into()]);
        assert_eq!(eval("a[0] + a[1]", &mut host), 30);
        assert_eq!(eval("a[5]", &mut host), 0);
    }

    #[test]
    fn test_number_bases() {
        let mut host = FakeHost::new();
        assert_eq!(eval("0x10", &mut host), 16);
        assert_eq!(eval("010", &mut host), 8);
        assert_eq!(eval("2#110", &mut host), 6);
    }
}
