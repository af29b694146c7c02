//! Argument type system (C3).
//!
//! Each argument type validates a candidate integer value against a range,
//! a multiple-of constraint and an exclusion set; register-class variants
//! additionally restrict membership to a fixed index set.

use std::ops::RangeInclusive;

/// Register class a register-shaped argument must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegClass {
    /// Any of x0..x31.
    Any,
    /// Non-zero general register (x1..x31), used by compressed nz forms.
    NonZero,
    /// Compressed 3-bit register field, x8..x15.
    Compressed,
    /// The stack pointer, x2.
    Sp,
    /// The zero register, x0.
    Zero,
    /// Non-zero and not SP (x1, x3..x31).
    NonZeroNotSp,
}

impl RegClass {
    pub fn contains(&self, reg: u32) -> bool {
        match self {
            RegClass::Any => reg <= 31,
            RegClass::NonZero => (1..=31).contains(&reg),
            RegClass::Compressed => (8..=15).contains(&reg),
            RegClass::Sp => reg == 2,
            RegClass::Zero => reg == 0,
            RegClass::NonZeroNotSp => reg != 0 && reg != 2 && reg <= 31,
        }
    }
}

/// An argument type: either a register class, or a numeric range with a
/// multiple-of constraint, exclusions, and a PC-relative flag.
#[derive(Debug, Clone)]
pub enum ArgType {
    Reg(RegClass),
    /// Numeric immediate/offset argument.
    Num {
        range: RangeInclusive<i64>,
        multiple_of: i64,
        exclude: Vec<i64>,
        pc_relative: bool,
    },
}

impl ArgType {
    pub fn num(range: RangeInclusive<i64>) -> ArgType {
        ArgType::Num { range, multiple_of: 1, exclude: Vec::new(), pc_relative: false }
    }

    pub fn with_multiple_of(mut self, m: i64) -> ArgType {
        if let ArgType::Num { multiple_of, .. } = &mut self {
            *multiple_of = m;
        }
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<i64>) -> ArgType {
        if let ArgType::Num { exclude: e, .. } = &mut self {
            *e = exclude;
        }
        self
    }

    pub fn pc_relative(mut self) -> ArgType {
        if let ArgType::Num { pc_relative, .. } = &mut self {
            *pc_relative = true;
        }
        self
    }

    /// Flags PC-relative offsets (13/12/21/9-bit jump/branch forms).
    pub fn is_rel_offset(&self) -> bool {
        matches!(self, ArgType::Num { pc_relative: true, .. })
    }

    /// `min <= v <= max AND v mod multiple_of == 0 AND v not in exclude`.
    pub fn accepts(&self, value: i64) -> bool {
        match self {
            ArgType::Reg(class) => value >= 0 && class.contains(value as u32),
            ArgType::Num { range, multiple_of, exclude, .. } => {
                range.contains(&value) && value % multiple_of == 0 && !exclude.contains(&value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_classes() {
        assert!(RegClass::Compressed.contains(8));
        assert!(!RegClass::Compressed.contains(7));
        assert!(RegClass::Sp.contains(2));
        assert!(!RegClass::Sp.contains(3));
        assert!(RegClass::NonZeroNotSp.contains(1));
        assert!(!RegClass::NonZeroNotSp.contains(2));
        assert!(!RegClass::NonZeroNotSp.contains(0));
    }

    #[test]
    fn numeric_multiple_of_and_exclude() {
        let t = ArgType::num(-2048..=2047).with_multiple_of(2).with_exclude(vec![0]);
        assert!(t.accepts(2));
        assert!(!t.accepts(3));
        assert!(!t.accepts(0));
        assert!(!t.accepts(2048));
    }
}
