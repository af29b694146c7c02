//! IR emission helper used by the front-end (C8): wraps a [`Program`] with
//! auto-label/auto-local counters so statement dispatch code doesn't have
//! to thread naming state through every parse function.

use super::{Arg, BinaryOp, CompareOp, Program, Stmt, UnaryOp};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Builder {
    pub program: Program,
    namespace: String,
    next_auto_label: u32,
    next_local: u32,
}

impl Builder {
    pub fn new(namespace: impl Into<String>) -> Builder {
        let namespace = namespace.into();
        let mut b = Builder { program: Program::new(), namespace: namespace.clone(), next_auto_label: 0, next_local: 0 };
        b.program.push(Stmt::Namespace(namespace));
        b
    }

    /// `<ns>::__ALB_<k>` — a fresh compiler-generated label.
    pub fn fresh_label(&mut self) -> String {
        let name = format!("{}::__ALB_{}", self.namespace, self.next_auto_label);
        self.next_auto_label += 1;
        name
    }

    /// `<ns>::__ULB_<line_number>` — the label for a source line number.
    pub fn source_label(&self, line_number: u32) -> String {
        format!("{}::__ULB_{}", self.namespace, line_number)
    }

    /// `<ns>::__LCL_<k>` — a fresh IR temporary.
    pub fn fresh_local(&mut self, ty: Value) -> String {
        let name = format!("{}::__LCL_{}", self.namespace, self.next_local);
        self.next_local += 1;
        self.emit(Stmt::LocalAlloc { local: name.clone(), ty });
        name
    }

    pub fn free_local(&mut self, name: impl Into<String>) {
        self.emit(Stmt::LocalFree(name.into()));
    }

    pub fn emit(&mut self, stmt: Stmt) {
        self.program.push(stmt);
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.emit(Stmt::Label(name.into()));
    }

    pub fn jump(&mut self, label: impl Into<String>) {
        self.emit(Stmt::Jump(label.into()));
    }

    pub fn jump_if_false(&mut self, label: impl Into<String>) {
        self.emit(Stmt::JumpIfFalse(label.into()));
    }

    pub fn jump_if_true(&mut self, label: impl Into<String>) {
        self.emit(Stmt::JumpIfTrue(label.into()));
    }

    pub fn assign(&mut self, src: Arg, dst: Arg) {
        self.emit(Stmt::Assign { src, dst });
    }

    pub fn binary(&mut self, op: BinaryOp, a: Arg, b: Arg, dst: Arg) {
        self.emit(Stmt::Binary { op, a, b, dst });
    }

    pub fn unary(&mut self, op: UnaryOp, a: Arg, dst: Arg) {
        self.emit(Stmt::Unary { op, a, dst });
    }

    pub fn compare(&mut self, op: CompareOp, a: Arg, b: Arg) {
        self.emit(Stmt::Compare { op, a, b });
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    #[test]
    fn fresh_names_are_unique_and_namespaced() {
        let mut b = Builder::new("NS1");
        let l1 = b.fresh_label();
        let l2 = b.fresh_label();
        assert_ne!(l1, l2);
        assert!(l1.starts_with("NS1::__ALB_"));
        assert_eq!(b.source_label(30), "NS1::__ULB_30");
    }

    #[test]
    fn fresh_local_emits_an_la_statement() {
        let mut b = Builder::new("NS1");
        let name = b.fresh_local(Value::new("", ValueType::Int));
        assert!(matches!(b.program.stmts.last(), Some(Stmt::LocalAlloc { local, .. }) if *local == name));
    }
}
