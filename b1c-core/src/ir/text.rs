//! IR text format (§6.3): one statement per line, `:label` or
//! `CMD,arg1,arg2,…`, arguments as `value<TYPE>` or `func(a1,a2,…)`.

use super::{BinaryOp, CompareOp, Program, Stmt, UnaryOp};
use crate::value::{Value, ValueType};

fn type_suffix(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Unknown => "",
        ValueType::Byte => "BYTE",
        ValueType::Int => "INT",
        ValueType::Word => "WORD",
        ValueType::Long => "LONG",
        ValueType::String => "STRING",
        ValueType::Label => "LABEL",
        ValueType::VarRef => "VARREF",
        ValueType::Text => "TEXT",
        ValueType::Common => "COMMON",
        ValueType::Invalid => "INVALID",
    }
}

fn render_value(v: &Value) -> String {
    let suffix = type_suffix(v.ty);
    if suffix.is_empty() {
        v.text.clone()
    } else {
        format!("{}<{}>", v.text, suffix)
    }
}

fn render_arg(arg: &[Value]) -> String {
    match arg {
        [] => String::new(),
        [single] => render_value(single),
        [head, rest @ ..] => {
            let inner: Vec<String> = rest.iter().map(render_value).collect();
            format!("{}({})", render_value(head), inner.join(","))
        }
    }
}

fn push_field(out: &mut String, field: &str) {
    out.push(',');
    out.push_str(field);
}

/// Render one statement as its IR text line (without a trailing newline).
pub fn render_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Namespace(name) => format!("NS,{name}"),
        Stmt::Interrupt(name) => format!("INT,{name}"),
        Stmt::Def { name, ret, args } => {
            let mut out = format!("DEF,{name},{}", render_value(ret));
            for a in args {
                push_field(&mut out, &render_value(a));
            }
            out
        }
        Stmt::Label(name) => format!(":{name}"),
        Stmt::GlobalAlloc { var, ty, subs } => {
            let mut out = format!("GA,{var},{}", render_value(ty));
            for s in subs {
                push_field(&mut out, &render_arg(s));
            }
            out
        }
        Stmt::MappedAlloc { var, ty, address, subs } => {
            let mut out = format!("MA,{var},{},{}", render_value(ty), render_value(address));
            for s in subs {
                push_field(&mut out, &render_arg(s));
            }
            out
        }
        Stmt::GlobalFree(var) => format!("GF,{var}"),
        Stmt::LocalAlloc { local, ty } => format!("LA,{local},{}", render_value(ty)),
        Stmt::LocalFree(local) => format!("LF,{local}"),
        Stmt::Assign { src, dst } => format!("=,{},{}", render_arg(src), render_arg(dst)),
        Stmt::Unary { op, a, dst } => {
            let sym = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{sym},{},{}", render_arg(a), render_arg(dst))
        }
        Stmt::Binary { op, a, b, dst } => {
            format!("{},{},{},{}", op.symbol(), render_arg(a), render_arg(b), render_arg(dst))
        }
        Stmt::Compare { op, a, b } => format!("{},{},{}", op.symbol(), render_arg(a), render_arg(b)),
        Stmt::Jump(l) => format!("JMP,{l}"),
        Stmt::JumpIfTrue(l) => format!("JT,{l}"),
        Stmt::JumpIfFalse(l) => format!("JF,{l}"),
        Stmt::Call(l) => format!("CALL,{l}"),
        Stmt::Return => "RET".to_string(),
        Stmt::ReturnValue(v) => format!("RETVAL,{}", render_value(v)),
        Stmt::Data { ns, values } => {
            let mut out = format!("DAT,{ns}");
            for v in values {
                push_field(&mut out, &render_value(v));
            }
            out
        }
        Stmt::Read { ns, dst } => format!("READ,{ns},{}", render_arg(dst)),
        Stmt::Restore { ns, label } => match label {
            Some(l) => format!("RST,{ns},{l}"),
            None => format!("RST,{ns}"),
        },
        Stmt::TextIn { dev, dst } => format!("IN,{},{}", render_value(dev), render_arg(dst)),
        Stmt::TextOut { dev, expr } => format!("OUT,{},{}", render_value(dev), render_arg(expr)),
        Stmt::Get { dev, dst, count } => render_io("GET", dev, dst, count.as_deref()),
        Stmt::Put { dev, src, count } => render_io("PUT", dev, src, count.as_deref()),
        Stmt::Transfer { dev, dst, count } => render_io("TRR", dev, dst, count.as_deref()),
        Stmt::ExtraArg(v) => format!("XARG,{}", render_value(v)),
        Stmt::Set { knob, val } => format!("SET,{knob},{}", render_value(val)),
        Stmt::Ioctl { dev, cmd, arg } => {
            let mut out = format!("IOCTL,{},{}", render_value(dev), render_value(cmd));
            if let Some(a) = arg {
                push_field(&mut out, &render_value(a));
            }
            out
        }
        Stmt::ErrorTrap { cause, label } => format!("ERR,{},{label}", render_value(cause)),
        Stmt::End => "END".to_string(),
        Stmt::Stop => "STOP".to_string(),
        Stmt::InlineAsm(text) => format!(";ASM {text}"),
    }
}

fn render_io(cmd: &str, dev: &Value, arg: &[Value], count: Option<&[Value]>) -> String {
    let mut out = format!("{cmd},{},{}", render_value(dev), render_arg(arg));
    if let Some(c) = count {
        push_field(&mut out, &render_arg(c));
    }
    out
}

/// Render a full program as IR text, one statement per line.
pub fn render_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.stmts {
        out.push_str(&render_stmt(stmt));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Arg;

    fn arg(v: Value) -> Arg {
        vec![v]
    }

    #[test]
    fn renders_label_and_assign() {
        let p = Program {
            stmts: vec![
                Stmt::Label("L1".to_string()),
                Stmt::Assign { src: arg(Value::int(3)), dst: arg(Value::new("NS1::__VAR_A", ValueType::Int)) },
                Stmt::End,
            ],
        };
        let text = render_program(&p);
        assert_eq!(text, ":L1\n=,3<BYTE>,NS1::__VAR_A<INT>\nEND\n");
    }

    #[test]
    fn renders_subscripted_arg_as_call_form() {
        let sub: Arg = vec![Value::new("NS1::__VAR_A", ValueType::Int), Value::int(1)];
        assert_eq!(render_arg(&sub), "NS1::__VAR_A<INT>(1<BYTE>)");
    }
}
