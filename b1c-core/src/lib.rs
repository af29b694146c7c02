//! `b1c-core`: the BASIC compiler's front half. Turns line-numbered BASIC
//! source into optimized, type-checked three-address IR; the `b1c` binary
//! crate carries IR the rest of the way to RISC-V assembly text.
//!
//! Pipeline: [`frontend::compile_files`] (C8/C9) → [`optimizer::Optimizer`]
//! (C10) → [`typeck::infer_types`] (C11).

pub mod error;
pub mod frontend;
pub mod ir;
pub mod optimizer;
pub mod symtab;
pub mod typeck;
pub mod value;

pub use error::{CompileError, Diagnostics, Warning, WarningKind};
pub use ir::{Program, Stmt};
pub use symtab::SymbolTable;

/// Run the full front-end pipeline: parse, optionally optimize to a fixed
/// point, then bind and check types. Returns the finished IR alongside the
/// symbol table (needed by the assembler-text emitter for variable
/// layout) and any accumulated warnings.
///
/// `optimize = false` skips [`optimizer::Optimizer`] entirely, matching the
/// compiler's `-no` flag: the type checker still runs against the raw IR.
pub fn compile(sources: &[(String, String)], optimize: bool) -> Result<(Program, SymbolTable, Diagnostics), CompileError> {
    let (mut program, symtab, diag) = frontend::compile_files(sources)?;

    if optimize {
        let mut opt = optimizer::Optimizer::new();
        opt.run_to_fixed_point(&mut program);
        log::debug!("optimizer reached a fixed point after {} round(s)", opt.rounds_run());
    }

    typeck::infer_types(&mut program, &symtab)?;

    Ok((program, symtab, diag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program_end_to_end() {
        let source = "10 LET A = 1\n20 PRINT A\n";
        let (program, _symtab, diag) = compile(&[("main.bas".to_string(), source.to_string())], true).unwrap();
        assert!(!program.stmts.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn skipping_optimization_leaves_redundant_code_intact() {
        let source = "10 LET A = 1\n20 LET A = A\n30 PRINT A\n";
        let (program, _symtab, _diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert_eq!(program.stmts.len(), 4);
    }

    #[test]
    fn dim_with_dims_and_initializer_emits_alloc_and_assigns() {
        let source = "10 DIM A(5) AS INT = 1,2,3\n20 PRINT A(0)\n";
        let (program, _symtab, diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::GlobalAlloc { subs, .. } if !subs.is_empty())));
        assert!(diag.is_empty());
    }

    #[test]
    fn def_emits_signature_and_is_callable() {
        let source = "10 DEF SQUARE(X) = X * X\n20 LET A = SQUARE(3)\n";
        let (program, _symtab, _diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::Def { .. })));
    }

    #[test]
    fn get_put_transfer_emit_their_statements() {
        let source = "10 DIM A\n20 GET #DISK, A\n30 PUT #DISK, A USING XOR(255)\n40 TRANSFER #DISK, A\n";
        let (program, _symtab, diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::Get { .. })));
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::Put { .. })));
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::Transfer { .. })));
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::ExtraArg(v) if v.text.starts_with("XORIN="))));
        assert!(diag.is_empty());
    }

    #[test]
    fn get_over_array_range_lowers_to_base_and_count() {
        let source = "10 DIM A(10)\n20 GET #DISK, A(0 TO 4)\n";
        let (program, _symtab, _diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        let get = program.stmts.iter().find_map(|s| match s {
            Stmt::Get { dst, count, .. } => Some((dst.clone(), count.clone())),
            _ => None,
        });
        let (dst, count) = get.expect("GET statement should be present");
        assert!(dst.len() > 1, "array-range target should carry a base pointer plus offset");
        assert!(count.is_some(), "array-range target should carry a computed element count");
    }

    #[test]
    fn on_goto_branches_on_selector_value() {
        let source = "10 ON 1 GOTO 100,200\n100 PRINT \"A\"\n200 PRINT \"B\"\n";
        let (program, _symtab, diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::Compare { .. })));
        assert!(diag.is_empty());
    }

    #[test]
    fn erase_frees_a_declared_array() {
        let source = "10 DIM A(5)\n20 ERASE A\n";
        let (program, _symtab, diag) = compile(&[("main.bas".to_string(), source.to_string())], false).unwrap();
        assert!(program.stmts.iter().any(|s| matches!(s, Stmt::GlobalFree(_))));
        assert!(diag.is_empty());
    }

    #[test]
    fn erase_of_unknown_name_is_an_error() {
        let source = "10 ERASE NOSUCHVAR\n";
        let result = compile(&[("main.bas".to_string(), source.to_string())], false);
        assert!(result.is_err());
    }
}
