use crate::value::Value;

/// Serializes `value` with no extraneous whitespace.
pub fn stringify(value: &Value) -> String {
	let mut out = String::new();
	write_value(value, &mut out, None, 0);
	out
}

/// Serializes `value` with two-space indentation per nesting level.
pub fn stringify_pretty(value: &Value) -> String {
	let mut out = String::new();
	write_value(value, &mut out, Some(2), 0);
	out
}

fn write_value(value: &Value, out: &mut String, indent: Option<usize>, depth: usize) {
	match value {
		Value::Null => out.push_str("null"),
		Value::Boolean(true) => out.push_str("true"),
		Value::Boolean(false) => out.push_str("false"),
		Value::Integer(i) => out.push_str(&i.to_string()),
		Value::Decimal(d) => out.push_str(&format_decimal(*d)),
		Value::String(s) => write_string(s, out),
		Value::Array(items) => write_array(items, out, indent, depth),
		Value::Object(object) => write_object(object, out, indent, depth),
	}
}

fn write_array(items: &[Value], out: &mut String, indent: Option<usize>, depth: usize) {
	if items.is_empty() {
		out.push_str("[]");
		return;
	}
	out.push('[');
	for (i, item) in items.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		newline_indent(out, indent, depth + 1);
		write_value(item, out, indent, depth + 1);
	}
	newline_indent(out, indent, depth);
	out.push(']');
}

fn write_object(object: &crate::value::Object, out: &mut String, indent: Option<usize>, depth: usize) {
	if object.is_empty() {
		out.push_str("{}");
		return;
	}
	out.push('{');
	for (i, (key, value)) in object.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		newline_indent(out, indent, depth + 1);
		write_string(key, out);
		out.push(':');
		if indent.is_some() {
			out.push(' ');
		}
		write_value(value, out, indent, depth + 1);
	}
	newline_indent(out, indent, depth);
	out.push('}');
}

fn newline_indent(out: &mut String, indent: Option<usize>, depth: usize) {
	if let Some(width) = indent {
		out.push('\n');
		for _ in 0..(width * depth) {
			out.push(' ');
		}
	}
}

fn write_string(s: &str, out: &mut String) {
	out.push('"');
	for c in s.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\u{8}' => out.push_str("\\b"),
			'\u{C}' => out.push_str("\\f"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
			c => out.push(c),
		}
	}
	out.push('"');
}

/// Formats a decimal with trailing zeros trimmed to a single fractional
/// digit minimum: `1.500` becomes `1.5`, but `2.0` stays `2.0` (never
/// `2.`), so the output always re-parses as a `Decimal`, not an `Integer`.
fn format_decimal(d: f64) -> String {
	if !d.is_finite() {
		// JSON has no representation for NaN/Infinity; emit null rather
		// than invalid JSON.
		return "null".to_string();
	}
	// Rust's `Display` for `f64` already produces the shortest string that
	// round-trips back to the same value, so no manual trailing-zero
	// trimming is needed beyond making sure a fractional part is present.
	let mut text = format!("{d}");
	if !text.contains('.') {
		text.push_str(".0");
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Object;

	#[test]
	fn formats_decimals() {
		assert_eq!(format_decimal(1.5), "1.5");
		assert_eq!(format_decimal(1.500), "1.5");
		assert_eq!(format_decimal(2.0), "2.0");
		assert_eq!(format_decimal(0.1), "0.1");
	}

	#[test]
	fn compact_object_has_no_whitespace() {
		let mut object = Object::new();
		object.insert("a", Value::Integer(1));
		object.insert("b", Value::Boolean(true));
		assert_eq!(stringify(&Value::Object(object)), r#"{"a":1,"b":true}"#);
	}

	#[test]
	fn pretty_array_is_indented() {
		let value = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
		assert_eq!(stringify_pretty(&value), "[\n  1,\n  2\n]");
	}

	#[test]
	fn strings_are_escaped() {
		let value = Value::String("a\"b\\c\nd".to_string());
		assert_eq!(stringify(&value), r#""a\"b\\c\nd""#);
	}

	#[test]
	fn empty_containers_stay_compact_in_pretty_mode() {
		assert_eq!(stringify_pretty(&Value::Array(vec![])), "[]");
		assert_eq!(stringify_pretty(&Value::Object(Object::new())), "{}");
	}
}
