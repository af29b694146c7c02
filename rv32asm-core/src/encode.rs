//! Bit-template encoder (C1).
//!
//! A template is a space-separated list of tokens describing how to pack
//! instruction words. Tokens:
//!
//! - `N:W` — literal `N` (hex), `W` (hex) bits wide.
//! - `{a:b:W}` — a `W`-bit (hex) field starting at bit `b` (hex) of argument
//!   number `a`. `a` may carry a dotted postfix (`3.H20`) applied before
//!   extraction (see [`crate::eval::Postfix`]).
//! - `|` — separates successive instruction words in a pseudo-instruction
//!   expansion.
//!
//! Fields are packed MSB-first within each word; each word is then emitted
//! little-endian, 2 or 4 bytes depending on its total bit count.

use crate::error::AsmError;
use crate::eval::Postfix;
use bitvec::prelude::*;

/// One parsed template token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal { value: i64, width: u32 },
    Field { arg: usize, postfix: Option<Postfix>, bit: u32, width: u32 },
}

/// One instruction word's worth of tokens.
#[derive(Debug, Clone, Default)]
struct Segment {
    tokens: Vec<Token>,
}

/// A fully parsed bit template, ready to render against argument values.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string. Fails with [`AsmError::BadTemplate`] if a
    /// segment's field widths don't sum to a multiple of 16 bits.
    pub fn parse(raw: &str) -> Result<Template, AsmError> {
        let mut segments = Vec::new();
        let mut current = Segment::default();

        for tok in raw.split_whitespace() {
            if tok == "|" {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            current.tokens.push(parse_token(raw, tok)?);
        }
        segments.push(current);

        for seg in &segments {
            let total: u32 = seg.tokens.iter().map(token_width).sum();
            if total == 0 || total % 16 != 0 {
                return Err(AsmError::BadTemplate {
                    template: raw.to_string(),
                    detail: format!("segment width {total} is not a positive multiple of 16"),
                });
            }
        }

        Ok(Template { raw: raw.to_string(), segments })
    }

    /// Total encoded size in bytes across every word in the expansion.
    pub fn size_bytes(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.tokens.iter().map(token_width).sum::<u32>() as usize / 8)
            .sum()
    }

    /// Render the template against evaluated argument values, producing the
    /// little-endian byte sequence for every word in order.
    pub fn render(&self, args: &[i64]) -> Result<Vec<u8>, AsmError> {
        let mut out = Vec::with_capacity(self.size_bytes());
        for seg in &self.segments {
            let total: u32 = seg.tokens.iter().map(token_width).sum();
            let mut word: BitVec<u32, Msb0> = BitVec::repeat(false, total as usize);
            let mut pos = 0usize;
            for tok in &seg.tokens {
                let (value, width) = match tok {
                    Token::Literal { value, width } => (*value, *width),
                    Token::Field { arg, postfix, bit, width } => {
                        let raw_val = *args.get(*arg).ok_or_else(|| AsmError::BadTemplate {
                            template: self.raw.clone(),
                            detail: format!("template references missing argument {arg}"),
                        })?;
                        let transformed = match postfix {
                            Some(p) => p.apply(raw_val),
                            None => raw_val,
                        };
                        let mask: i64 = if *width >= 63 { -1 } else { (1i64 << width) - 1 };
                        let extracted = (transformed >> bit) & mask;
                        (extracted, *width)
                    }
                };
                let max = 1i64 << width;
                if value < 0 || value >= max {
                    return Err(AsmError::BadTemplate {
                        template: self.raw.clone(),
                        detail: format!("field value {value} exceeds {width}-bit width"),
                    });
                }
                let bits = &mut word[pos..pos + width as usize];
                for i in 0..width as usize {
                    let b = (value >> (width as usize - 1 - i)) & 1;
                    bits.set(i, b != 0);
                }
                pos += width as usize;
            }
            let word_bytes = total / 8;
            let raw_word: u32 = word.load_be::<u32>();
            for i in 0..word_bytes {
                out.push(((raw_word >> (i * 8)) & 0xFF) as u8);
            }
        }
        Ok(out)
    }
}

fn token_width(tok: &Token) -> u32 {
    match tok {
        Token::Literal { width, .. } => *width,
        Token::Field { width, .. } => *width,
    }
}

fn parse_token(raw: &str, tok: &str) -> Result<Token, AsmError> {
    let bad = |detail: String| AsmError::BadTemplate { template: raw.to_string(), detail };

    if let Some(inner) = tok.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let parts: Vec<&str> = inner.split(':').collect();
        if parts.len() != 3 {
            return Err(bad(format!("malformed field token `{tok}`")));
        }
        let (arg_str, postfix) = match parts[0].split_once('.') {
            Some((a, p)) => (a, Some(Postfix::parse(p).map_err(|e| bad(e))?)),
            None => (parts[0], None),
        };
        let arg: usize = arg_str.parse().map_err(|_| bad(format!("bad argument index `{arg_str}`")))?;
        let bit = u32::from_str_radix(parts[1], 16).map_err(|_| bad(format!("bad bit offset `{}`", parts[1])))?;
        let width = u32::from_str_radix(parts[2], 16).map_err(|_| bad(format!("bad width `{}`", parts[2])))?;
        return Ok(Token::Field { arg, postfix, bit, width });
    }

    let parts: Vec<&str> = tok.split(':').collect();
    if parts.len() != 2 {
        return Err(bad(format!("malformed literal token `{tok}`")));
    }
    let value = i64::from_str_radix(parts[0], 16).map_err(|_| bad(format!("bad literal `{}`", parts[0])))?;
    let width = u32::from_str_radix(parts[1], 16).map_err(|_| bad(format!("bad width `{}`", parts[1])))?;
    Ok(Token::Literal { value, width })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_only_word() {
        let t = Template::parse("0:3 8:8 0:5").unwrap();
        assert_eq!(t.size_bytes(), 2);
        let bytes = t.render(&[]).unwrap();
        assert_eq!(bytes.len(), 2);
    }

    #[test]
    fn rejects_non_multiple_of_16() {
        assert!(Template::parse("0:3 0:4").is_err());
    }

    #[test]
    fn field_extraction_and_overflow() {
        let t = Template::parse("{0:0:4} 0:C").unwrap();
        assert!(t.render(&[0xF]).is_ok());
        assert!(t.render(&[0x1F]).is_err());
    }

    #[test]
    fn addi_like_word_encodes_little_endian() {
        // opcode 0010011 (0x13), funct3 0, rd=x5, rs1=x6, imm=1
        let t = Template::parse("{2:0:C} {1:0:5} 0:3 {0:0:5} 13:7").unwrap();
        let bytes = t.render(&[5, 6, 1]).unwrap();
        assert_eq!(bytes.len(), 4);
        let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(word & 0x7F, 0x13);
    }
}
