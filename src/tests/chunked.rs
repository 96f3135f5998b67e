use super::*;

use serde_json::{json, Value};

fn fixtures() -> Vec<(&'static str, Option<Value>)> {
    vec![
        (r#"Here is the code: {"foo": "bar""#, None),
        (r#"{"a":[{"b":{"c":[1,2"#, None),
        (r#"{"a":1"#, Some(json!({"required": ["a", "b"]}))),
        (
            r#"{"user":{"name":"A""#,
            Some(json!({
                "required": ["user"],
                "properties": {"user": {"$ref": "#/definitions/User"}},
                "definitions": {"User": {"required": ["name", "id"]}}
            })),
        ),
        (r#"{"a":1,"#, None),
        (r#"[{"note":"multi βyte ✓ content"#, None),
    ]
}

#[test]
fn chunk_boundaries_do_not_change_the_output() {
    for (input, schema) in fixtures() {
        let whole = heal_to_string(input, schema.as_ref());
        for seed in [3u64, 17, 99] {
            let sizes = split_sizes(seed, input.chars().count());
            let chunks = chunk_by_char(input, &sizes);
            let split = heal_chunks_to_string(chunks.iter().map(String::as_str), schema.as_ref());
            assert_eq!(split, whole, "seed {seed} changed output for {input:?}");
        }
        serde_json::from_str::<Value>(&whole)
            .unwrap_or_else(|e| panic!("unparseable output {whole:?}: {e}"));
    }
}

#[test]
fn healed_output_is_a_fixed_point() {
    for (input, schema) in fixtures() {
        let healed = heal_to_string(input, schema.as_ref());
        let again = heal_to_string(&healed, schema.as_ref());
        assert_eq!(again, healed);
    }
}

#[test]
fn escape_split_across_chunks() {
    let mut h = Healer::new(Options::default());
    let mut out = h.process("{\"s\":\"a\\");
    out.push_str(&h.process("\"b"));
    out.push_str(&h.finish());
    let v: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v, json!({"s":"a\"b"}));
}

#[test]
fn key_split_across_chunks_counts_as_seen() {
    let schema = json!({"required": ["long_key"]});
    let out = heal_chunks_to_string(["{\"lo", "ng_key\": 1"], Some(&schema));
    assert_eq!(out, "{\"long_key\": 1}");
}
