use crate::error::ParseError;
use crate::value::{Object, Value};

/// Parses a single JSON value from `text`, rejecting any trailing,
/// non-whitespace data after it.
///
/// The parser is an iterative recursive-descent parser: nested
/// arrays/objects are tracked on an explicit [`Frame`] stack rather than
/// through Rust call recursion, so parsing depth is bounded by heap
/// rather than by the native call stack.
pub fn parse(text: &str) -> Result<Value, ParseError> {
	let mut cursor = Cursor::new(text);
	let value = cursor.parse_value()?;
	cursor.skip_ws();
	if cursor.pos != cursor.bytes.len() {
		return Err(cursor.err("unexpected trailing data after JSON value"));
	}
	Ok(value)
}

enum Frame {
	Array(Vec<Value>),
	// pending key, and the byte offset at which it started (for duplicate-key errors)
	Object(Object, (String, usize)),
}

struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn new(text: &'a str) -> Self {
		Self {
			bytes: text.as_bytes(),
			pos: 0,
		}
	}

	fn err(&self, message: impl Into<String>) -> ParseError {
		ParseError::new(message, self.pos)
	}

	fn err_at(&self, message: impl Into<String>, offset: usize) -> ParseError {
		ParseError::new(message, offset)
	}

	fn err_eof(&self) -> ParseError {
		self.err("unexpected end of input")
	}

	fn peek(&self) -> Option<u8> {
		self.bytes.get(self.pos).copied()
	}

	fn bump(&mut self) -> Option<u8> {
		let b = self.peek()?;
		self.pos += 1;
		Some(b)
	}

	fn skip_ws(&mut self) {
		while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
			self.pos += 1;
		}
	}

	fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
		if self.peek() == Some(byte) {
			self.pos += 1;
			Ok(())
		} else {
			Err(self.err(format!("expected '{}'", byte as char)))
		}
	}

	fn expect_literal(&mut self, literal: &str, value: Value) -> Result<Value, ParseError> {
		if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
			self.pos += literal.len();
			Ok(value)
		} else {
			Err(self.err(format!("invalid literal, expected '{literal}'")))
		}
	}

	/// Parses a value, iteratively flattening nested containers via an
	/// explicit stack instead of recursing.
	fn parse_value(&mut self) -> Result<Value, ParseError> {
		let mut stack: Vec<Frame> = Vec::new();

		'outer: loop {
			self.skip_ws();
			let mut value = match self.peek() {
				None => return Err(self.err_eof()),
				Some(b'{') => {
					self.pos += 1;
					self.skip_ws();
					if self.peek() == Some(b'}') {
						self.pos += 1;
						Value::Object(Object::new())
					} else {
						let key = self.parse_object_key()?;
						stack.push(Frame::Object(Object::new(), key));
						continue 'outer;
					}
				}
				Some(b'[') => {
					self.pos += 1;
					self.skip_ws();
					if self.peek() == Some(b']') {
						self.pos += 1;
						Value::Array(Vec::new())
					} else {
						stack.push(Frame::Array(Vec::new()));
						continue 'outer;
					}
				}
				_ => self.parse_scalar()?,
			};

			// Attach `value` to the enclosing container, cascading closes
			// upward as long as containers terminate immediately.
			loop {
				match stack.pop() {
					None => return Ok(value),
					Some(Frame::Array(mut items)) => {
						items.push(value);
						self.skip_ws();
						match self.peek() {
							Some(b',') => {
								self.pos += 1;
								self.skip_ws();
								if self.peek() == Some(b']') {
									return Err(self.err("trailing comma before ']'"));
								}
								stack.push(Frame::Array(items));
								continue 'outer;
							}
							Some(b']') => {
								self.pos += 1;
								value = Value::Array(items);
								continue;
							}
							Some(_) => return Err(self.err("expected ',' or ']'")),
							None => return Err(self.err_eof()),
						}
					}
					Some(Frame::Object(mut object, (key, key_offset))) => {
						if object.contains_key(&key) {
							return Err(self.err_at(format!("duplicate object key '{key}'"), key_offset));
						}
						object.insert(key, value);
						self.skip_ws();
						match self.peek() {
							Some(b',') => {
								self.pos += 1;
								self.skip_ws();
								if self.peek() == Some(b'}') {
									return Err(self.err("trailing comma before '}'"));
								}
								let next_key = self.parse_object_key()?;
								stack.push(Frame::Object(object, next_key));
								continue 'outer;
							}
							Some(b'}') => {
								self.pos += 1;
								value = Value::Object(object);
								continue;
							}
							Some(_) => return Err(self.err("expected ',' or '}'")),
							None => return Err(self.err_eof()),
						}
					}
				}
			}
		}
	}

	/// Parses `"key":` and returns the key together with its start offset.
	fn parse_object_key(&mut self) -> Result<(String, usize), ParseError> {
		self.skip_ws();
		let offset = self.pos;
		if self.peek() != Some(b'"') {
			return Err(self.err("expected string object key"));
		}
		let key = self.parse_string_literal()?;
		self.skip_ws();
		self.expect(b':')?;
		Ok((key, offset))
	}

	fn parse_scalar(&mut self) -> Result<Value, ParseError> {
		match self.peek() {
			Some(b'"') => Ok(Value::String(self.parse_string_literal()?)),
			Some(b't') => self.expect_literal("true", Value::Boolean(true)),
			Some(b'f') => self.expect_literal("false", Value::Boolean(false)),
			Some(b'n') => self.expect_literal("null", Value::Null),
			Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
			Some(_) => Err(self.err("unexpected character")),
			None => Err(self.err_eof()),
		}
	}

	fn parse_number(&mut self) -> Result<Value, ParseError> {
		let start = self.pos;
		let mut is_decimal = false;

		if self.peek() == Some(b'-') {
			self.pos += 1;
		}
		if self.peek() != Some(b'0')
			&& !matches!(self.peek(), Some(c) if c.is_ascii_digit())
		{
			return Err(self.err("invalid number"));
		}
		while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
			self.pos += 1;
		}
		if self.peek() == Some(b'.') {
			is_decimal = true;
			self.pos += 1;
			if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
				return Err(self.err("invalid number: expected digit after '.'"));
			}
			while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
				self.pos += 1;
			}
		}
		if matches!(self.peek(), Some(b'e' | b'E')) {
			is_decimal = true;
			self.pos += 1;
			if matches!(self.peek(), Some(b'+' | b'-')) {
				self.pos += 1;
			}
			if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
				return Err(self.err("invalid number: expected digit in exponent"));
			}
			while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
				self.pos += 1;
			}
		}

		let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("ascii number text");
		if is_decimal {
			let decimal: f64 = text
				.parse()
				.map_err(|_| self.err_at("invalid decimal literal", start))?;
			Ok(Value::Decimal(decimal))
		} else {
			match text.parse::<i64>() {
				Ok(integer) => Ok(Value::Integer(integer)),
				// Overflow: reinterpret as a Decimal rather than failing.
				Err(_) => {
					let decimal: f64 = text
						.parse()
						.map_err(|_| self.err_at("invalid numeric literal", start))?;
					Ok(Value::Decimal(decimal))
				}
			}
		}
	}

	fn parse_string_literal(&mut self) -> Result<String, ParseError> {
		self.expect(b'"')?;
		let mut out = String::new();
		loop {
			match self.bump() {
				None => return Err(self.err_eof()),
				Some(b'"') => return Ok(out),
				Some(b'\\') => self.parse_escape(&mut out)?,
				Some(b) if b < 0x80 => out.push(b as char),
				Some(b) => {
					// Continuation byte of a multi-byte UTF-8 sequence: copy the
					// whole sequence through verbatim since the source `&str`
					// is already valid UTF-8.
					let seq_start = self.pos - 1;
					let len = utf8_len(b);
					let end = (seq_start + len).min(self.bytes.len());
					let chunk = std::str::from_utf8(&self.bytes[seq_start..end])
						.map_err(|_| self.err_at("invalid UTF-8 in string literal", seq_start))?;
					out.push_str(chunk);
					self.pos = end;
				}
			}
		}
	}

	fn parse_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
		let escape_start = self.pos - 1;
		match self.bump() {
			None => Err(self.err_eof()),
			Some(b'"') => {
				out.push('"');
				Ok(())
			}
			Some(b'\\') => {
				out.push('\\');
				Ok(())
			}
			Some(b'/') => {
				out.push('/');
				Ok(())
			}
			Some(b'0') => {
				out.push('\0');
				Ok(())
			}
			Some(b'a') => {
				out.push('\u{7}');
				Ok(())
			}
			Some(b'b') => {
				out.push('\u{8}');
				Ok(())
			}
			Some(b't') => {
				out.push('\t');
				Ok(())
			}
			Some(b'n') => {
				out.push('\n');
				Ok(())
			}
			Some(b'v') => {
				out.push('\u{B}');
				Ok(())
			}
			Some(b'f') => {
				out.push('\u{C}');
				Ok(())
			}
			Some(b'r') => {
				out.push('\r');
				Ok(())
			}
			Some(b'u') => self.parse_unicode_escape(out, escape_start),
			Some(other) => {
				// Unrecognized escape: keep it literally, backslash and all.
				out.push('\\');
				out.push(other as char);
				Ok(())
			}
		}
	}

	/// Parses the 4 hex digits after `\u`. On success, combines a leading
	/// UTF-16 high surrogate with an immediately following `\uXXXX` low
	/// surrogate into one scalar value. A malformed (non-hex or truncated)
	/// escape is kept literally rather than erroring, per the framed
	/// message format's tolerance for this one case.
	fn parse_unicode_escape(&mut self, out: &mut String, escape_start: usize) -> Result<(), ParseError> {
		let Some(first) = self.read_hex4() else {
			self.push_literal_escape(out, escape_start);
			return Ok(());
		};

		if (0xD800..=0xDBFF).contains(&first) {
			let before_second = self.pos;
			if self.bytes[self.pos..].starts_with(b"\\u") {
				self.pos += 2;
				if let Some(second) = self.read_hex4() {
					if (0xDC00..=0xDFFF).contains(&second) {
						let scalar = 0x10000
							+ (u32::from(first) - 0xD800) * 0x400
							+ (u32::from(second) - 0xDC00);
						if let Some(c) = char::from_u32(scalar) {
							out.push(c);
							return Ok(());
						}
					}
				}
			}
			// Not a valid surrogate pair: restore position and error.
			self.pos = before_second;
			return Err(self.err_at("unpaired UTF-16 surrogate in \\u escape", escape_start));
		}

		if (0xDC00..=0xDFFF).contains(&first) {
			return Err(self.err_at("unpaired UTF-16 surrogate in \\u escape", escape_start));
		}

		match char::from_u32(u32::from(first)) {
			Some(c) => out.push(c),
			None => self.push_literal_escape(out, escape_start),
		}
		Ok(())
	}

	fn push_literal_escape(&mut self, out: &mut String, escape_start: usize) {
		let end = (escape_start + 2).min(self.bytes.len());
		let literal = std::str::from_utf8(&self.bytes[escape_start..end]).unwrap_or("\\u");
		out.push_str(literal);
	}

	/// Reads exactly 4 hex digits, advancing past them. Returns `None`
	/// (without advancing) if fewer than 4 valid hex digits are present.
	fn read_hex4(&mut self) -> Option<u16> {
		if self.pos + 4 > self.bytes.len() {
			return None;
		}
		let slice = &self.bytes[self.pos..self.pos + 4];
		if !slice.iter().all(|b| b.is_ascii_hexdigit()) {
			return None;
		}
		let text = std::str::from_utf8(slice).ok()?;
		let value = u16::from_str_radix(text, 16).ok()?;
		self.pos += 4;
		Some(value)
	}
}

fn utf8_len(first_byte: u8) -> usize {
	if first_byte & 0b1110_0000 == 0b1100_0000 {
		2
	} else if first_byte & 0b1111_0000 == 0b1110_0000 {
		3
	} else if first_byte & 0b1111_1000 == 0b1111_0000 {
		4
	} else {
		1
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_literals() {
		assert_eq!(parse("null").unwrap(), Value::Null);
		assert_eq!(parse("true").unwrap(), Value::Boolean(true));
		assert_eq!(parse("false").unwrap(), Value::Boolean(false));
	}

	#[test]
	fn parses_integer_and_decimal() {
		assert_eq!(parse("42").unwrap(), Value::Integer(42));
		assert_eq!(parse("-7").unwrap(), Value::Integer(-7));
		assert_eq!(parse("1.5").unwrap(), Value::Decimal(1.5));
		assert_eq!(parse("1e3").unwrap(), Value::Decimal(1000.0));
	}

	#[test]
	fn integer_overflow_becomes_decimal() {
		let huge = "99999999999999999999";
		match parse(huge).unwrap() {
			Value::Decimal(_) => {}
			other => panic!("expected Decimal, got {other:?}"),
		}
	}

	#[test]
	fn parses_escapes() {
		let value = parse(r#""a\tb\nc\"d\\e""#).unwrap();
		assert_eq!(value, Value::String("a\tb\nc\"d\\e".to_string()));
	}

	#[test]
	fn parses_unicode_escape() {
		let value = parse(r#""é""#).unwrap();
		assert_eq!(value, Value::String("é".to_string()));
	}

	#[test]
	fn parses_surrogate_pair() {
		// U+1F600 GRINNING FACE
		let value = parse(r#""😀""#).unwrap();
		assert_eq!(value, Value::String("\u{1F600}".to_string()));
	}

	#[test]
	fn malformed_unicode_escape_kept_literal() {
		let value = parse(r#""\uZZZZ""#).unwrap();
		assert_eq!(value, Value::String("\\uZZZZ".to_string()));
	}

	#[test]
	fn rejects_trailing_comma_in_array() {
		assert!(parse("[1, 2,]").is_err());
	}

	#[test]
	fn rejects_trailing_comma_in_object() {
		assert!(parse(r#"{"a": 1,}"#).is_err());
	}

	#[test]
	fn rejects_duplicate_keys() {
		let err = parse(r#"{"a": 1, "a": 2}"#).unwrap_err();
		assert!(err.message.contains("duplicate"));
	}

	#[test]
	fn rejects_eof_mid_value() {
		assert!(parse("{\"a\": ").is_err());
	}

	#[test]
	fn parses_nested_containers() {
		let value = parse(r#"{"a": [1, {"b": 2}, 3], "c": null}"#).unwrap();
		let object = value.as_object().unwrap();
		assert_eq!(object.get("c"), Some(&Value::Null));
		let array = object.get("a").unwrap().as_array().unwrap();
		assert_eq!(array[0], Value::Integer(1));
	}

	#[test]
	fn rejects_trailing_data() {
		assert!(parse("1 2").is_err());
	}
}
