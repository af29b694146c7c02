//! RV32 register name table.
//!
//! Both the numeric `Xn` form and the ABI mnemonic form (`ZERO`, `RA`,
//! `SP`, `A0`..`A7`, `T0`..`T6`, `S0`..`S11`) resolve to the same index.

use std::collections::HashMap;

pub fn register_map() -> HashMap<String, i64> {
    let mut map = HashMap::new();
    for i in 0..32 {
        map.insert(format!("X{i}"), i as i64);
    }
    let abi: &[(&str, i64)] = &[
        ("ZERO", 0),
        ("RA", 1),
        ("SP", 2),
        ("GP", 3),
        ("TP", 4),
        ("T0", 5),
        ("T1", 6),
        ("T2", 7),
        ("S0", 8),
        ("FP", 8),
        ("S1", 9),
        ("A0", 10),
        ("A1", 11),
        ("A2", 12),
        ("A3", 13),
        ("A4", 14),
        ("A5", 15),
        ("A6", 16),
        ("A7", 17),
        ("S2", 18),
        ("S3", 19),
        ("S4", 20),
        ("S5", 21),
        ("S6", 22),
        ("S7", 23),
        ("S8", 24),
        ("S9", 25),
        ("S10", 26),
        ("S11", 27),
        ("T3", 28),
        ("T4", 29),
        ("T5", 30),
        ("T6", 31),
    ];
    for (name, idx) in abi {
        map.insert(name.to_string(), *idx);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_names_match_numeric_form() {
        let m = register_map();
        assert_eq!(m["A0"], m["X10"]);
        assert_eq!(m["SP"], m["X2"]);
        assert_eq!(m["ZERO"], 0);
    }
}
