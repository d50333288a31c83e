use domain::FieldValue;
use iot2alexa_normalize::{
    FieldMapper, MappingRule, NormalizeError, map_payload, round_half_up, validate_rules,
};
use serde_json::json;

fn temp_rule() -> MappingRule {
    MappingRule::new("temp", "$.sensor.value")
        .expect("rule")
        .with_scale(1.8)
        .with_round(true)
}

#[test]
fn scaled_integer_is_rounded() {
    let outcome = map_payload(&json!({"sensor": {"value": 20}}), &[temp_rule()]);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.values.get("temp"), Some(&FieldValue::I64(36)));
}

#[test]
fn non_numeric_scale_target_only_fails_its_rule() {
    let rules = vec![
        temp_rule(),
        MappingRule::new("state", "$.sensor.state").expect("rule"),
    ];
    let outcome = map_payload(
        &json!({"sensor": {"value": "warm", "state": "ok"}}),
        &rules,
    );
    assert!(!outcome.values.contains_key("temp"));
    assert_eq!(outcome.values.get("state"), Some(&FieldValue::from("ok")));
    assert_eq!(
        outcome.errors,
        vec![NormalizeError::NotNumeric {
            key: "temp".to_string(),
            found: "string",
        }]
    );
    assert_eq!(outcome.errors[0].key(), Some("temp"));
}

#[test]
fn unresolved_path_is_skipped() {
    let rules = vec![
        MappingRule::new("humidity", "$.sensor.humidity").expect("rule"),
        MappingRule::new("battery", "$.battery").expect("rule"),
    ];
    let outcome = map_payload(&json!({"sensor": {}, "battery": 87}), &rules);
    assert_eq!(outcome.values.len(), 1);
    assert_eq!(outcome.values.get("battery"), Some(&FieldValue::I64(87)));
    assert!(matches!(
        &outcome.errors[0],
        NormalizeError::Unresolved { key, .. } if key == "humidity"
    ));
}

#[test]
fn round_property_matches_floor_half_up() {
    let samples = [-2.5, -1.49, -0.5, 0.0, 0.49, 0.5, 1.5, 2.4999, 19.99, 1e6 + 0.5];
    for scale in [None, Some(1.8), Some(-0.1), Some(0.0)] {
        for sample in samples {
            let mut rule = MappingRule::new("v", "$.v").expect("rule").with_round(true);
            rule.scale = scale;
            let outcome = map_payload(&json!({ "v": sample }), &[rule]);
            let scaled = match scale {
                Some(scale) if scale != 0.0 => sample * scale,
                _ => sample,
            };
            assert_eq!(
                outcome.values.get("v"),
                Some(&FieldValue::I64((scaled + 0.5).floor() as i64)),
                "sample {} scale {:?}",
                sample,
                scale
            );
        }
    }
    assert_eq!(round_half_up(-0.5), 0);
    assert_eq!(round_half_up(2.5), 3);
}

#[test]
fn round_skips_non_float_values() {
    let rules = vec![
        MappingRule::new("count", "$.count").expect("rule").with_round(true),
        MappingRule::new("label", "$.label").expect("rule").with_round(true),
    ];
    let outcome = map_payload(&json!({"count": 7, "label": "x"}), &rules);
    assert_eq!(outcome.values.get("count"), Some(&FieldValue::I64(7)));
    assert_eq!(outcome.values.get("label"), Some(&FieldValue::from("x")));
    assert!(outcome.errors.is_empty());
}

#[test]
fn scale_without_round_yields_float() {
    let rule = MappingRule::new("power", "$.watts").expect("rule").with_scale(0.001);
    let outcome = map_payload(&json!({"watts": 1500}), &[rule]);
    assert_eq!(outcome.values.get("power"), Some(&FieldValue::F64(1.5)));
}

#[test]
fn zero_scale_means_no_scaling() {
    let rule = MappingRule::new("open", "$.open").expect("rule").with_scale(0.0);
    let outcome = map_payload(&json!({"open": true}), &[rule]);
    assert_eq!(outcome.values.get("open"), Some(&FieldValue::Bool(true)));
}

#[test]
fn structured_values_are_rejected() {
    let rules = vec![
        MappingRule::new("sensor", "$.sensor").expect("rule"),
        MappingRule::new("missing", "$.gone").expect("rule"),
    ];
    let outcome = map_payload(&json!({"sensor": {"value": 1}, "gone": null}), &rules);
    assert!(outcome.values.is_empty());
    assert_eq!(outcome.errors.len(), 2);
    assert!(matches!(
        &outcome.errors[1],
        NormalizeError::UnsupportedValue { found: "null", .. }
    ));
}

#[test]
fn array_elements_are_addressable() {
    let rule = MappingRule::new("first", "$.readings[0].t").expect("rule");
    let outcome = map_payload(&json!({"readings": [{"t": 1.25}, {"t": 2.5}]}), &[rule]);
    assert_eq!(outcome.values.get("first"), Some(&FieldValue::F64(1.25)));
}

#[test]
fn later_rule_wins_on_same_key() {
    let rules = vec![
        MappingRule::new("temp", "$.a").expect("rule"),
        MappingRule::new("temp", "$.b").expect("rule"),
    ];
    let outcome = map_payload(&json!({"a": 1, "b": 2}), &rules);
    assert_eq!(outcome.values.get("temp"), Some(&FieldValue::I64(2)));
}

#[test]
fn mapping_is_deterministic_and_total() {
    let rules = vec![temp_rule(), MappingRule::new("x", "$.x[2]").expect("rule")];
    let payloads = [
        json!(null),
        json!("text"),
        json!([1, 2, 3]),
        json!({"sensor": {"value": 12.5}, "x": [0, 1]}),
    ];
    for payload in payloads {
        let first = map_payload(&payload, &rules);
        let second = map_payload(&payload, &rules);
        assert_eq!(first, second);
        assert_eq!(first.values.len() + first.errors.len(), rules.len());
    }
}

#[test]
fn field_mapper_validates_keys() {
    let duplicate = vec![
        MappingRule::new("temp", "$.a").expect("rule"),
        MappingRule::new("temp", "$.b").expect("rule"),
    ];
    assert_eq!(
        FieldMapper::new(duplicate).expect_err("duplicate").to_string(),
        "invalid mapping rule: duplicate key temp"
    );
    let empty = vec![MappingRule::new(" ", "$.a").expect("rule")];
    assert!(validate_rules(&empty).is_err());

    let mapper = FieldMapper::new(vec![temp_rule()]).expect("mapper");
    assert_eq!(mapper.keys().collect::<Vec<_>>(), vec!["temp"]);
    let outcome = mapper.map(&json!({"sensor": {"value": 0}}));
    assert_eq!(outcome.values.get("temp"), Some(&FieldValue::I64(0)));
}

#[test]
fn malformed_path_is_rejected_up_front() {
    let err = MappingRule::new("temp", "$..value").expect_err("invalid");
    assert!(matches!(err, NormalizeError::InvalidPath { .. }));
}
