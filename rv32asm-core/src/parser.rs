//! RV32 assembly text parser.
//!
//! One physical line holds an optional `name:` label, then either a
//! `.SECTION` directive, a data directive (`.BYTE`/`.HALF`/`.WORD`/`.STRING`),
//! or an instruction (`MNEMONIC op1, op2, …`). `;` starts a comment that
//! runs to end of line. Everything here is textual: operand expressions are
//! not evaluated, only shaped, so the driver can defer evaluation until
//! labels are known.

use crate::error::AsmError;
use crate::layout::SectionKind;

/// One assembly-language operand, shaped but not yet evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A bare register name (`X5`, `A0`, `SP`, …).
    Reg(String),
    /// An expression text standing for an immediate, label, or constant.
    Value(String),
    /// `offset(base)` addressing, as used by loads, stores and `JALR`.
    Indexed { offset: String, base: String },
}

/// A data-section initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Bytes(Vec<String>),
    Halves(Vec<String>),
    Words(Vec<String>),
    Str(String),
}

/// The payload of one non-blank, non-comment-only source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    SectionBegin(SectionKind),
    Data(DataItem),
    Instruction { mnemonic: String, operands: Vec<Operand> },
}

/// A fully parsed source line: an optional label and an optional statement.
/// Both may be present (`LOOP: ADDI X5, X5, 1`), and either may be absent
/// (a bare label line, or a directive line with no label).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub stmt: Option<Statement>,
}

/// Strip a `;`-delimited trailing comment and trim whitespace.
fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse one physical source line. Returns `Ok(None)` for blank or
/// comment-only lines.
pub fn parse_line(raw: &str, lineno: u32) -> Result<Option<ParsedLine>, AsmError> {
    let text = strip_comment(raw);
    if text.is_empty() {
        return Ok(None);
    }

    let mut rest = text;
    let mut label = None;
    if let Some(colon) = find_label_colon(rest) {
        let name = rest[..colon].trim();
        if name.is_empty() || !name.chars().next().map(is_ident_start).unwrap_or(false) || !name.chars().all(is_ident_char) {
            return Err(AsmError::Syntax { line: lineno, detail: format!("bad label `{name}`") });
        }
        label = Some(name.to_uppercase());
        rest = rest[colon + 1..].trim();
    }

    if rest.is_empty() {
        return Ok(Some(ParsedLine { label, stmt: None }));
    }

    let stmt = if let Some(section) = rest.strip_prefix('.') {
        Some(parse_directive(section, lineno)?)
    } else {
        Some(parse_instruction(rest, lineno)?)
    };

    Ok(Some(ParsedLine { label, stmt }))
}

/// Find the `:` that ends a leading label, ignoring one inside a later
/// operand (so `JALR X1, 0(X2)` isn't mistaken for a label).
fn find_label_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !is_ident_start(bytes[0] as char) {
        return None;
    }
    let mut i = 0;
    while i < bytes.len() && is_ident_char(bytes[i] as char) {
        i += 1;
    }
    if i < bytes.len() && bytes[i] as char == ':' {
        Some(i)
    } else {
        None
    }
}

fn parse_directive(rest: &str, lineno: u32) -> Result<Statement, AsmError> {
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (rest, ""),
    };
    let upper = name.to_uppercase();
    match upper.as_str() {
        "DATA" => Ok(Statement::SectionBegin(SectionKind::Data)),
        "HEAP" => Ok(Statement::SectionBegin(SectionKind::Heap)),
        "STACK" => Ok(Statement::SectionBegin(SectionKind::Stack)),
        "CONST" => Ok(Statement::SectionBegin(SectionKind::Const)),
        "CODE" => Ok(Statement::SectionBegin(SectionKind::Code)),
        "INIT" => Ok(Statement::SectionBegin(SectionKind::Init)),
        "BYTE" => Ok(Statement::Data(DataItem::Bytes(split_csv(args)))),
        "HALF" => Ok(Statement::Data(DataItem::Halves(split_csv(args)))),
        "WORD" => Ok(Statement::Data(DataItem::Words(split_csv(args)))),
        "STRING" => Ok(Statement::Data(DataItem::Str(parse_quoted(args, lineno)?))),
        other => Err(AsmError::Syntax { line: lineno, detail: format!("unknown directive `.{other}`") }),
    }
}

fn parse_quoted(text: &str, lineno: u32) -> Result<String, AsmError> {
    let t = text.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        Ok(t[1..t.len() - 1].to_string())
    } else {
        Err(AsmError::Syntax { line: lineno, detail: format!("expected quoted string, got `{text}`") })
    }
}

fn split_csv(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(|s| s.trim().to_string()).collect()
}

fn parse_instruction(rest: &str, lineno: u32) -> Result<Statement, AsmError> {
    let (mnemonic, args) = match rest.split_once(char::is_whitespace) {
        Some((m, a)) => (m, a.trim()),
        None => (rest, ""),
    };
    let mnemonic = mnemonic.to_uppercase();
    let operands = split_operands(args, lineno)?.iter().map(|s| parse_operand(s)).collect::<Vec<_>>();
    Ok(Statement::Instruction { mnemonic, operands })
}

/// Split on top-level commas, respecting `(...)` nesting so
/// `LW X5, 4(X6)` yields two operands, not three.
fn split_operands(text: &str, lineno: u32) -> Result<Vec<String>, AsmError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(AsmError::Syntax { line: lineno, detail: format!("unbalanced parens in `{text}`") });
                }
            }
            ',' if depth == 0 => {
                out.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AsmError::Syntax { line: lineno, detail: format!("unbalanced parens in `{text}`") });
    }
    out.push(text[start..].trim().to_string());
    Ok(out)
}

fn parse_operand(text: &str) -> Operand {
    if let Some(open) = text.find('(') {
        if let Some(base) = text.strip_suffix(')') {
            let offset = text[..open].trim();
            let base = base[open + 1..].trim();
            return Operand::Indexed { offset: if offset.is_empty() { "0".to_string() } else { offset.to_string() }, base: base.to_string() };
        }
    }
    if text.chars().next().map(is_ident_start).unwrap_or(false) && text.chars().all(is_ident_char) && crate::registers::register_map().contains_key(&text.to_uppercase()) {
        return Operand::Reg(text.to_uppercase());
    }
    Operand::Value(text.to_string())
}

/// Catalog signature token for one operand (`XV` for a register, `V` or
/// `V(XV)` for a value/indexed form).
fn operand_signature(op: &Operand) -> String {
    match op {
        Operand::Reg(_) => "XV".to_string(),
        Operand::Value(_) => "V".to_string(),
        Operand::Indexed { .. } => "V(XV)".to_string(),
    }
}

/// The catalog signature string for a mnemonic applied to these operands,
/// e.g. `ADDIXV,XV,V`.
pub fn signature(mnemonic: &str, operands: &[Operand]) -> String {
    let mut sig = mnemonic.to_string();
    let shapes: Vec<String> = operands.iter().map(operand_signature).collect();
    sig.push_str(&shapes.join(","));
    sig
}

/// Flatten operands into their evaluation-order expression texts: a plain
/// register or value contributes one entry, `offset(base)` contributes two
/// (offset, then base), matching [`crate::catalog::Encoding::arg_types`]
/// ordering.
pub fn flatten_operand_texts(operands: &[Operand]) -> Vec<String> {
    let mut out = Vec::new();
    for op in operands {
        match op {
            Operand::Reg(name) => out.push(name.clone()),
            Operand::Value(text) => out.push(text.clone()),
            Operand::Indexed { offset, base } => {
                out.push(offset.clone());
                out.push(base.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_are_none() {
        assert!(parse_line("", 1).unwrap().is_none());
        assert!(parse_line("   ; just a comment", 1).unwrap().is_none());
    }

    #[test]
    fn label_and_instruction_share_a_line() {
        let parsed = parse_line("LOOP: ADDI X5, X5, 1", 1).unwrap().unwrap();
        assert_eq!(parsed.label.as_deref(), Some("LOOP"));
        match parsed.stmt.unwrap() {
            Statement::Instruction { mnemonic, operands } => {
                assert_eq!(mnemonic, "ADDI");
                assert_eq!(operands.len(), 3);
            }
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn indexed_operand_and_signature() {
        let parsed = parse_line("LW X5, 4(X6)", 1).unwrap().unwrap();
        let Statement::Instruction { mnemonic, operands } = parsed.stmt.unwrap() else { panic!() };
        assert_eq!(operands[1], Operand::Indexed { offset: "4".to_string(), base: "X6".to_string() });
        assert_eq!(signature(&mnemonic, &operands), "LWXV,V(XV)");
        assert_eq!(flatten_operand_texts(&operands), vec!["X5", "4", "X6"]);
    }

    #[test]
    fn section_and_data_directives() {
        assert_eq!(parse_line(".CODE", 1).unwrap().unwrap().stmt, Some(Statement::SectionBegin(SectionKind::Code)));
        let parsed = parse_line(".STRING \"hi\"", 1).unwrap().unwrap();
        assert_eq!(parsed.stmt, Some(Statement::Data(DataItem::Str("hi".to_string()))));
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(parse_line("LW X5, 4(X6", 1).is_err());
    }
}
