/// A JSON value.
///
/// `Integer` and `Decimal` are disjoint variants: a bare `1` parses to
/// `Integer(1)`, while `1.0` or `1e0` parses to `Decimal(1.0)`. Use
/// [`Value::is_number`] for the union of both.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Boolean(bool),
	Integer(i64),
	Decimal(f64),
	String(String),
	Array(Vec<Value>),
	Object(Object),
}

/// An ordered JSON object.
///
/// Backed by a `Vec` rather than a hash map: objects in LSP messages are
/// small (a handful of fields) and insertion order matters for
/// deterministic serialization, so a linear scan beats the overhead of a
/// hashing map here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
	entries: Vec<(String, Value)>,
}

impl Object {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.iter().any(|(k, _)| k == key)
	}

	/// Inserts a key-value pair, overwriting any existing value for `key`
	/// in place (preserving its original position).
	pub fn insert(&mut self, key: impl Into<String>, value: Value) {
		let key = key.into();
		if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
			slot.1 = value;
		} else {
			self.entries.push((key, value));
		}
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		let idx = self.entries.iter().position(|(k, _)| k == key)?;
		Some(self.entries.remove(idx).1)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}
}

impl FromIterator<(String, Value)> for Object {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		let mut object = Object::new();
		for (key, value) in iter {
			object.insert(key, value);
		}
		object
	}
}

impl<'a> IntoIterator for &'a Object {
	type Item = (&'a str, &'a Value);
	type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;

	fn into_iter(self) -> Self::IntoIter {
		Box::new(self.iter())
	}
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// True for both `Integer` and `Decimal` variants.
	pub fn is_number(&self) -> bool {
		matches!(self, Value::Integer(_) | Value::Decimal(_))
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Integer(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Integer(i) => Some(*i as f64),
			Value::Decimal(d) => Some(*d),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s.as_str()),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(items) => Some(items.as_slice()),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Boolean(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Integer(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Decimal(value)
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.to_owned())
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::Array(value)
	}
}

impl From<Object> for Value {
	fn from(value: Object) -> Self {
		Value::Object(value)
	}
}
