//! Instruction catalog and selection (C2).
//!
//! Instructions are keyed by a *signature*: register-like arguments render
//! as `XV`, everything else as `V` (e.g. `ADDIXV,XV,V` matches
//! `ADDI reg, reg, imm`). A signature may have several candidate encodings
//! differing in argument-type constraints, variant id, and speed/size —
//! selection picks the cheapest one whose arguments all validate.
//!
//! Per-candidate predicates that originally lived as subclass overrides
//! (`RV32Inst12Eq`, `RV32Inst12Ne`, ...) are represented as a data tag
//! (`ArgPredicate`) interpreted by a small function, not as a trait
//! hierarchy — see DESIGN.md.

use crate::argtype::ArgType;
use crate::encode::Template;
use crate::error::AsmError;

/// A non-PC-relative extra constraint between already-evaluated arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPredicate {
    /// No extra constraint.
    None,
    /// arg[0] == arg[1] (e.g. `BEQZ`-shaped rewrites, XOR rd,rs,rd matching).
    Eq01,
    /// arg[0] != arg[1].
    Ne01,
    /// arg[0] != arg[1] and the low-12 of the immediate (arg index given) is 0.
    Ne01ImmLow12Zero(usize),
}

impl ArgPredicate {
    fn check(&self, values: &[i64]) -> bool {
        match self {
            ArgPredicate::None => true,
            ArgPredicate::Eq01 => values.len() >= 2 && values[0] == values[1],
            ArgPredicate::Ne01 => values.len() >= 2 && values[0] != values[1],
            ArgPredicate::Ne01ImmLow12Zero(idx) => {
                values.len() > *idx && values.len() >= 2 && values[0] != values[1] && (values[*idx] & 0xFFF) == 0
            }
        }
    }
}

/// Variant rank of a pseudo-instruction expansion. `Ordinary` never
/// participates in the fix-up widening loop; `Ranked(n)` is tried in
/// ascending order as `n` climbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariantId {
    Ordinary,
    Ranked(u32),
}

/// One candidate encoding for a signature.
#[derive(Debug, Clone)]
pub struct Encoding {
    pub signature: String,
    pub variant: VariantId,
    pub arg_types: Vec<ArgType>,
    pub template: Template,
    pub speed: u32,
    pub predicate: ArgPredicate,
}

impl Encoding {
    pub fn size_bytes(&self) -> usize {
        self.template.size_bytes()
    }

    fn metric(&self) -> u64 {
        self.speed as u64 * 256 + self.size_bytes() as u64
    }
}

/// Ordered multimap from signature to candidate encodings, preserving
/// declaration order (selection ties break by that order).
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Encoding>,
}

/// Outcome of [`Catalog::select`].
pub enum Selection<'a> {
    /// A candidate whose non-PC-relative arguments all validated.
    Found(&'a Encoding),
    /// No candidate validated yet, but `fallback` was generally valid
    /// (PC-relative ranges not yet checked) — used by the driver before
    /// layout addresses are known.
    Fallback(&'a Encoding),
    /// A wider variant should be tried next.
    RetryWithVariant(VariantId),
    /// The mnemonic/signature is entirely unknown.
    Unknown,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog { entries: Vec::new() }
    }

    pub fn register(&mut self, encoding: Encoding) {
        self.entries.push(encoding);
    }

    /// Selection algorithm of spec §4.4: evaluate every non-PC-relative
    /// argument against each candidate for `signature`, keep the cheapest
    /// surviving one; remember a fallback if none fully validates but at
    /// least one is "generally valid"; request widening when a forced
    /// `variant` narrows the set to nothing.
    pub fn select(
        &self,
        signature: &str,
        values: &[i64],
        pc_relative_mask: &[bool],
        forced_variant: Option<VariantId>,
    ) -> Result<Selection<'_>, AsmError> {
        let candidates: Vec<&Encoding> = self
            .entries
            .iter()
            .filter(|e| e.signature == signature)
            .filter(|e| forced_variant.map(|v| e.variant == v).unwrap_or(true))
            .collect();

        if candidates.is_empty() {
            if forced_variant.is_some() {
                // A narrower variant filter produced nothing: no wider
                // variant exists for this mnemonic.
                return Ok(Selection::Unknown);
            }
            return Ok(Selection::Unknown);
        }

        let mut best: Option<&Encoding> = None;
        let mut fallback: Option<&Encoding> = None;
        let mut any_wider_variant = false;

        for cand in &candidates {
            if cand.arg_types.len() != values.len() {
                continue;
            }
            let mut generally_valid = true;
            let mut fully_valid = true;
            for (i, (at, v)) in cand.arg_types.iter().zip(values.iter()).enumerate() {
                let is_pc = pc_relative_mask.get(i).copied().unwrap_or(false);
                if is_pc {
                    continue;
                }
                if !at.accepts(*v) {
                    generally_valid = false;
                    fully_valid = false;
                }
            }
            if fully_valid && !cand.predicate.check(values) {
                fully_valid = false;
                generally_valid = false;
            }
            // Check PC-relative fields only once addresses are known
            // (values already carry the resolved displacement by then).
            for (i, (at, v)) in cand.arg_types.iter().zip(values.iter()).enumerate() {
                if pc_relative_mask.get(i).copied().unwrap_or(false) && !at.accepts(*v) {
                    fully_valid = false;
                }
            }

            if fully_valid {
                if best.map(|b| cand.metric() < b.metric()).unwrap_or(true) {
                    best = Some(cand);
                }
            } else if generally_valid && fallback.is_none() {
                fallback = Some(cand);
            }
            if matches!(cand.variant, VariantId::Ranked(_)) {
                any_wider_variant = true;
            }
        }

        if let Some(b) = best {
            return Ok(Selection::Found(b));
        }

        if any_wider_variant {
            let next = next_variant(forced_variant);
            let exists = self
                .entries
                .iter()
                .any(|e| e.signature == signature && e.variant == next);
            if exists {
                return Ok(Selection::RetryWithVariant(next));
            }
        }

        if let Some(f) = fallback {
            return Ok(Selection::Fallback(f));
        }

        Ok(Selection::Unknown)
    }
}

fn next_variant(current: Option<VariantId>) -> VariantId {
    match current {
        None | Some(VariantId::Ordinary) => VariantId::Ranked(0),
        Some(VariantId::Ranked(n)) => VariantId::Ranked(n + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argtype::RegClass;

    fn enc(sig: &str, variant: VariantId, types: Vec<ArgType>, speed: u32, tmpl: &str) -> Encoding {
        Encoding {
            signature: sig.to_string(),
            variant,
            arg_types: types,
            template: Template::parse(tmpl).unwrap(),
            speed,
            predicate: ArgPredicate::None,
        }
    }

    #[test]
    fn picks_cheapest_surviving_candidate() {
        let mut cat = Catalog::new();
        cat.register(enc(
            "ADDIXV,XV,V",
            VariantId::Ordinary,
            vec![ArgType::Reg(RegClass::Any), ArgType::Reg(RegClass::Any), ArgType::num(-2048..=2047)],
            1,
            "0:3 0:D",
        ));
        cat.register(enc(
            "ADDIXV,XV,V",
            VariantId::Ordinary,
            vec![ArgType::Reg(RegClass::Compressed), ArgType::Reg(RegClass::Compressed), ArgType::num(-32..=31)],
            1,
            "0:3 0:D",
        ));
        let sel = cat.select("ADDIXV,XV,V", &[8, 9, 1], &[false, false, false], None).unwrap();
        match sel {
            Selection::Found(e) => assert_eq!(e.arg_types.len(), 3),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn unknown_signature() {
        let cat = Catalog::new();
        assert!(matches!(cat.select("NOPE", &[], &[], None).unwrap(), Selection::Unknown));
    }

    #[test]
    fn requests_wider_variant_when_forced_variant_exhausted() {
        let mut cat = Catalog::new();
        cat.register(enc("JV", VariantId::Ranked(0), vec![ArgType::num(-4096..=4095).pc_relative()], 1, "0:10"));
        cat.register(enc("JV", VariantId::Ranked(1), vec![ArgType::num(-1_048_576..=1_048_575).pc_relative()], 2, "0:10 0:10"));
        let sel = cat.select("JV", &[5000], &[true], Some(VariantId::Ranked(0))).unwrap();
        assert!(matches!(sel, Selection::RetryWithVariant(VariantId::Ranked(1))));
    }
}
