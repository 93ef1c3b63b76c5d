//! Namelist text writer.

use std::fmt::Write as _;

use crate::namelist::Namelist;
use crate::value::Value;

fn scalar(out: &mut String, value: &Value) {
    match value {
        Value::Str(s) => {
            let _ = write!(out, "'{}'", s.replace('\'', "''"));
        }
        Value::Int(v) => {
            let _ = write!(out, "{}", v);
        }
        Value::Float(v) => {
            // `{:?}` keeps a decimal point or exponent so the value reads back as real.
            let _ = write!(out, "{:?}", v);
        }
        Value::Bool(b) => out.push_str(if *b { ".true." } else { ".false." }),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                scalar(out, item);
            }
        }
    }
}

/// Render a namelist as text that [`crate::parse_namelist`] reads back
/// unchanged.
pub fn render_namelist(namelist: &Namelist) -> String {
    let mut out = String::new();
    for group in namelist.all_groups() {
        let _ = writeln!(out, "&{}", group.name());
        for (param, value) in group.iter() {
            let _ = write!(out, "    {} = ", param);
            scalar(&mut out, value);
            out.push('\n');
        }
        out.push_str("/\n\n");
    }
    out
}
