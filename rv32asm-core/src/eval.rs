//! Expression evaluator (C4) and numeric postfixes.
//!
//! Assembly expressions resolve symbolic names against, in order: labels,
//! the CSR/FENCE predefined maps, register names, and predefined
//! compile-time constants. Values are signed 32-bit integers or strings;
//! numeric postfixes reinterpret an integer as a sign-extended slice of its
//! bits.

use crate::error::AsmError;
use std::collections::HashMap;

/// A numeric postfix transform (`.L12`, `.H20`, `.L`, `.H`, and compositions
/// like `.LH`/`.HL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postfix {
    /// Sign-extended low `n` bits.
    LowBits(u32),
    /// Signed value of the top bits above `n`, such that
    /// `(high << n) + low_n == original`.
    HighBits(u32),
    /// Low 16-bit half of a word.
    LowHalf,
    /// High 16-bit half of a word.
    HighHalf,
    /// Composition applied left-to-right (e.g. `.LH` = low-half then high-half).
    Seq(Vec<Postfix>),
}

impl Postfix {
    /// Parse the text following the `.` in e.g. `3.H20` -> `"H20"`.
    pub fn parse(text: &str) -> Result<Postfix, String> {
        let mut parts = Vec::new();
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] as char {
                'L' | 'l' => {
                    let start = i + 1;
                    let mut j = start;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    if j > start {
                        let n: u32 = text[start..j].parse().map_err(|_| format!("bad postfix `{text}`"))?;
                        parts.push(Postfix::LowBits(n));
                        i = j;
                    } else {
                        parts.push(Postfix::LowHalf);
                        i += 1;
                    }
                }
                'H' | 'h' => {
                    let start = i + 1;
                    let mut j = start;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    if j > start {
                        let n: u32 = text[start..j].parse().map_err(|_| format!("bad postfix `{text}`"))?;
                        parts.push(Postfix::HighBits(n));
                        i = j;
                    } else {
                        parts.push(Postfix::HighHalf);
                        i += 1;
                    }
                }
                _ => return Err(format!("unknown postfix `{text}`")),
            }
        }
        if parts.is_empty() {
            return Err(format!("empty postfix `{text}`"));
        }
        if parts.len() == 1 {
            Ok(parts.into_iter().next().unwrap())
        } else {
            Ok(Postfix::Seq(parts))
        }
    }

    /// Apply the transform to a 32-bit value (sign-extending as needed).
    pub fn apply(&self, value: i64) -> i64 {
        match self {
            Postfix::LowBits(n) => sign_extend(value & ((1i64 << n) - 1), *n),
            Postfix::HighBits(n) => {
                // `.H<n>` names the width of the *result*, not the shift:
                // `.H20` pairs with `.L12` over a 32-bit value, so the
                // shift is `32 - n`.
                let shift = 32 - n;
                let low = value & ((1i64 << shift) - 1);
                (value - sign_extend(low, shift)) >> shift
            }
            Postfix::LowHalf => sign_extend(value & 0xFFFF, 16),
            Postfix::HighHalf => sign_extend((value >> 16) & 0xFFFF, 16),
            Postfix::Seq(seq) => {
                let mut v = value;
                for p in seq {
                    v = p.apply(v);
                }
                v
            }
        }
    }
}

fn sign_extend(value: i64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// A resolved or pending value: either an integer or a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Int(i64),
    Str(String),
}

impl EvalValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EvalValue::Int(n) => Some(*n),
            EvalValue::Str(_) => None,
        }
    }
}

/// Read-only symbol context the evaluator resolves names against.
pub struct EvalContext<'a> {
    pub labels: &'a HashMap<String, i64>,
    pub csr: &'a HashMap<String, i64>,
    pub fence: &'a HashMap<String, i64>,
    pub registers: &'a HashMap<String, i64>,
    pub constants: &'a HashMap<String, i64>,
}

/// Evaluate a single already-tokenized expression atom: either a numeric
/// literal (with optional postfix), a quoted string, or a symbolic name.
pub fn eval_atom(text: &str, ctx: &EvalContext) -> Result<EvalValue, AsmError> {
    let text = text.trim();
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        return Ok(EvalValue::Str(text[1..text.len() - 1].to_string()));
    }

    let (name, postfix) = match text.split_once('.') {
        Some((n, p)) if !n.is_empty() && p.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) => {
            (n, Some(Postfix::parse(p).map_err(|d| AsmError::Eval { line: 0, detail: d })?))
        }
        _ => (text, None),
    };

    let raw = if let Ok(n) = parse_number(name) {
        n
    } else if let Some(v) = ctx.labels.get(name) {
        *v
    } else if let Some(v) = ctx.csr.get(name) {
        *v
    } else if let Some(v) = ctx.fence.get(name) {
        *v
    } else if let Some(v) = ctx.registers.get(name) {
        *v
    } else if let Some(v) = ctx.constants.get(name) {
        *v
    } else {
        return Err(AsmError::Eval { line: 0, detail: format!("unknown symbol `{name}`") });
    };

    Ok(EvalValue::Int(match postfix {
        Some(p) => p.apply(raw),
        None => raw,
    }))
}

fn parse_number(text: &str) -> Result<i64, ()> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|_| ());
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).map_err(|_| ());
    }
    t.parse::<i64>().map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_high_12_20_reconstruct() {
        let value: i64 = 0x12345678;
        let low = Postfix::LowBits(12).apply(value);
        let high = Postfix::HighBits(20).apply(value);
        assert_eq!((high << 12) + low, value);
    }

    #[test]
    fn low_high_half() {
        let value: i64 = 0x1234_5678;
        assert_eq!(Postfix::LowHalf.apply(value), 0x5678);
        assert_eq!(Postfix::HighHalf.apply(value), 0x1234);
    }

    #[test]
    fn composed_postfix() {
        let p = Postfix::parse("LH").unwrap();
        assert!(matches!(p, Postfix::Seq(_)));
    }

    #[test]
    fn resolves_labels_then_registers_then_constants() {
        let labels = HashMap::from([("FOO".to_string(), 100i64)]);
        let csr = HashMap::new();
        let fence = HashMap::new();
        let registers = HashMap::from([("X5".to_string(), 5i64)]);
        let constants = HashMap::from([("PI_APPROX".to_string(), 3i64)]);
        let ctx = EvalContext { labels: &labels, csr: &csr, fence: &fence, registers: &registers, constants: &constants };
        assert_eq!(eval_atom("FOO", &ctx).unwrap(), EvalValue::Int(100));
        assert_eq!(eval_atom("X5", &ctx).unwrap(), EvalValue::Int(5));
        assert_eq!(eval_atom("PI_APPROX", &ctx).unwrap(), EvalValue::Int(3));
        assert_eq!(eval_atom("42", &ctx).unwrap(), EvalValue::Int(42));
    }
}
