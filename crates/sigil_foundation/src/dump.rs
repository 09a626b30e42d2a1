//! Debug renderings of values (`var_dump` and `print_r` layouts).

use std::fmt::Write;

use crate::array::{Array, Key};
use crate::numeric::format_float;
use crate::object::ObjectKind;
use crate::value::Value;

/// Renders a value in the `var_dump` layout, including the trailing newline.
#[must_use]
pub fn var_dump(value: &Value) -> String {
    let mut out = String::new();
    dump_into(&mut out, value, 0);
    out
}

fn dump_into(out: &mut String, value: &Value, depth: usize) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Null => {
            let _ = writeln!(out, "{pad}NULL");
        }
        Value::Bool(b) => {
            let _ = writeln!(out, "{pad}bool({b})");
        }
        Value::Int(n) => {
            let _ = writeln!(out, "{pad}int({n})");
        }
        Value::Float(f) => {
            let _ = writeln!(out, "{pad}float({})", format_float(*f));
        }
        Value::String(s) => {
            let _ = writeln!(out, "{pad}string({}) \"{s}\"", s.len());
        }
        Value::Array(array) => {
            let _ = writeln!(out, "{pad}array({}) {{", array.len());
            dump_entries(out, array, depth);
            let _ = writeln!(out, "{pad}}}");
        }
        Value::Reference(r) => dump_into(out, &r.borrow(), depth),
        Value::Object(object) => {
            let props = object.properties().unwrap_or_default();
            let _ = writeln!(out, "{pad}object({}) ({}) {{", object.class_name(), props.len());
            if let ObjectKind::Closure { name, .. } = object.kind() {
                let _ = writeln!(out, "{pad}  [\"name\"]=>");
                let _ = writeln!(out, "{pad}  string({}) \"{name}\"", name.len());
            }
            dump_entries(out, &props, depth);
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

fn dump_entries(out: &mut String, array: &Array, depth: usize) {
    let pad = "  ".repeat(depth + 1);
    for (key, value) in array.iter() {
        match key {
            Key::Int(n) => {
                let _ = writeln!(out, "{pad}[{n}]=>");
            }
            Key::Str(s) => {
                let _ = writeln!(out, "{pad}[\"{s}\"]=>");
            }
        }
        dump_into(out, value, depth + 1);
    }
}

/// Renders a value in the `print_r` layout.
#[must_use]
pub fn print_r(value: &Value) -> String {
    let mut out = String::new();
    print_into(&mut out, value, 0);
    out
}

fn print_into(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Array(array) => print_block(out, "Array", array, indent),
        Value::Object(object) => {
            let props = object.properties().unwrap_or_default();
            print_block(out, &format!("{} Object", object.class_name()), &props, indent);
        }
        Value::Reference(r) => print_into(out, &r.borrow(), indent),
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn print_block(out: &mut String, title: &str, array: &Array, indent: usize) {
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{pad}(");
    for (key, value) in array.iter() {
        let _ = write!(out, "{pad}    [{key}] => ");
        print_into(out, value, indent + 8);
        out.push('\n');
    }
    let _ = writeln!(out, "{pad})");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_scalars() {
        assert_eq!(var_dump(&Value::Int(1)), "int(1)\n");
        assert_eq!(var_dump(&Value::Float(1.0)), "float(1)\n");
        assert_eq!(var_dump(&Value::from("abc")), "string(3) \"abc\"\n");
        assert_eq!(var_dump(&Value::Bool(false)), "bool(false)\n");
        assert_eq!(var_dump(&Value::Null), "NULL\n");
    }

    #[test]
    fn dumps_nested_arrays() {
        let inner = Array::from_values([Value::Int(2)]);
        let outer: Array = [
            (Key::Int(0), Value::Int(1)),
            (Key::from("a"), Value::Array(inner)),
        ]
        .into_iter()
        .collect();
        let expected = "array(2) {\n  [0]=>\n  int(1)\n  [\"a\"]=>\n  array(1) {\n    [0]=>\n    int(2)\n  }\n}\n";
        assert_eq!(var_dump(&Value::Array(outer)), expected);
    }

    #[test]
    fn print_r_layout() {
        let inner = Array::from_values([Value::Int(1)]);
        let outer: Array = [
            (Key::from("a"), Value::Int(1)),
            (Key::from("b"), Value::Array(inner)),
        ]
        .into_iter()
        .collect();
        let expected = "Array\n(\n    [a] => 1\n    [b] => Array\n        (\n            [0] => 1\n        )\n\n)\n";
        assert_eq!(print_r(&Value::Array(outer)), expected);
        assert_eq!(print_r(&Value::from("x")), "x");
    }
}
