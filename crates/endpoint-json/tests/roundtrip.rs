use endpoint_json::{parse, stringify, Object, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
	let leaf = prop_oneof![
		Just(Value::Null),
		any::<bool>().prop_map(Value::Boolean),
		any::<i64>().prop_map(Value::Integer),
		(-1e6f64..1e6f64).prop_map(Value::Decimal),
		"[a-zA-Z0-9 _-]{0,12}".prop_map(Value::String),
	];

	leaf.prop_recursive(4, 64, 8, |inner| {
		prop_oneof![
			prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
			prop::collection::vec(("[a-zA-Z][a-zA-Z0-9_]{0,8}", inner), 0..6).prop_map(|entries| {
				let mut object = Object::new();
				for (key, value) in entries {
					object.insert(key, value);
				}
				Value::Object(object)
			}),
		]
	})
}

proptest! {
	#[test]
	fn round_trips_through_compact_stringify(value in arb_value()) {
		let text = stringify(&value);
		let parsed = parse(&text).expect("round-tripped JSON must re-parse");
		prop_assert_eq!(parsed, value);
	}
}

#[test]
fn literal_round_trip_examples() {
	for text in [
		r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"rootUri":"file:///tmp","capabilities":{}}}"#,
		r#"{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"hoverProvider":true}}}"#,
		r#"[{"jsonrpc":"2.0","id":1,"method":"a"},{"jsonrpc":"2.0","method":"b"}]"#,
	] {
		let value = parse(text).unwrap();
		let restringified = stringify(&value);
		let reparsed = parse(&restringified).unwrap();
		assert_eq!(value, reparsed);
	}
}
