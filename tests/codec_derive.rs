//! Derived codecs: records, unions, enums, generics and their agreement with
//! descriptor-driven conformance.

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use verticore::codec::{
    conform, decode, descriptor_of, encode, Codec, DecodeError, DescriptorCache, TypeDescriptor,
    CLASS_FIELD,
};
use verticore::value::{json, Value};

#[derive(Debug, Clone, PartialEq, Codec)]
struct Divide {
    a: i64,
    b: i64,
}

#[derive(Debug, Clone, PartialEq, Codec)]
struct Profile {
    login: String,
    #[codec(optional)]
    nickname: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Codec)]
#[codec(rename = "Credentials")]
struct Login {
    #[codec(rename = "user")]
    login: String,
    #[codec(redact)]
    password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
enum Status {
    Open,
    Closed,
    #[codec(rename = "in_review")]
    InReview,
}

#[derive(Debug, Clone, PartialEq, Codec)]
enum Shape {
    Circle { radius: f64 },
    Rect { width: f64, height: f64 },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Codec)]
struct Page<T> {
    items: Vec<T>,
    total: u64,
}

#[derive(Debug, Clone, PartialEq, Codec)]
struct Submission {
    id: u64,
    status: Status,
    tags: BTreeMap<String, i32>,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Codec)]
struct Revision(String);

#[derive(Debug, Clone, PartialEq, Codec)]
struct Marker;

#[test]
fn test_record_round_trip() {
    let value = encode(&Divide { a: 7, b: 2 }).unwrap();
    assert_eq!(value, json!({"a": 7, "b": 2}));
    assert_eq!(decode::<Divide>(&value).unwrap(), Divide { a: 7, b: 2 });
}

#[test]
fn test_record_field_order_preserved() {
    let value = encode(&Divide { a: 1, b: 2 }).unwrap();
    assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":1,"b":2}"#);
}

#[test]
fn test_missing_field_names_field_and_type() {
    let err = decode::<Divide>(&json!({"a": 4})).unwrap_err();
    assert_eq!(err.missing_field_name(), Some("b"));
    let message = err.to_string();
    assert!(message.contains("`b`"), "{message}");
    assert!(message.contains("i64"), "{message}");
}

#[test]
fn test_first_missing_field_in_declaration_order() {
    let err = decode::<Divide>(&json!({})).unwrap_err();
    assert_eq!(err.missing_field_name(), Some("a"));
}

#[test]
fn test_shape_mismatch_is_descriptive() {
    let err = decode::<Divide>(&json!([1, 2])).unwrap_err();
    assert!(matches!(err, DecodeError::Mismatch { .. }));

    let err = decode::<Divide>(&json!({"a": 1, "b": "two"})).unwrap_err();
    assert_eq!(err.path(), "$.b");
}

#[test]
fn test_unknown_keys_ignored() {
    let decoded: Divide = decode(&json!({"a": 1, "b": 2, "c": 3})).unwrap();
    assert_eq!(decoded, Divide { a: 1, b: 2 });
}

#[test]
fn test_optional_versus_nullable() {
    let profile = Profile {
        login: "ann".into(),
        nickname: None,
        email: None,
    };
    // optional None is omitted, plain Option None is null
    assert_eq!(encode(&profile).unwrap(), json!({"login": "ann", "email": null}));

    let decoded: Profile = decode(&json!({"login": "ann", "email": null})).unwrap();
    assert_eq!(decoded, profile);

    let err = decode::<Profile>(&json!({"login": "ann"})).unwrap_err();
    assert_eq!(err.missing_field_name(), Some("email"));

    let decoded: Profile =
        decode(&json!({"login": "ann", "nickname": "a", "email": "a@b.c"})).unwrap();
    assert_eq!(decoded.nickname.as_deref(), Some("a"));
}

#[test]
fn test_nested_option_descriptor_rejected() {
    // Some(None) and None share the same null encoding
    assert_eq!(encode(&Some(None::<i64>)).unwrap(), Value::Null);
    let err = descriptor_of::<Option<Option<i64>>>().validate().unwrap_err();
    assert!(err.reason.contains("nested nullable"), "{}", err.reason);

    let ok = descriptor_of::<Option<Vec<Option<i64>>>>();
    assert!(ok.validate().is_ok());
    let value = Some(vec![None, Some(3)]);
    assert_eq!(decode::<Option<Vec<Option<i64>>>>(&encode(&value).unwrap()).unwrap(), value);
}

#[test]
fn test_rename_and_redact() {
    let login = Login {
        login: "ann".into(),
        password: "hunter2".into(),
    };
    assert_eq!(
        encode(&login).unwrap(),
        json!({"user": "ann", "password": "hunter2"})
    );
    assert_eq!(Login::redacted_fields(), &["password"]);
    assert_eq!(Login::descriptor().to_string(), "Credentials");
}

#[test]
fn test_enum_uses_canonical_names() {
    assert_eq!(encode(&Status::InReview).unwrap(), json!("in_review"));
    assert_eq!(decode::<Status>(&json!("Closed")).unwrap(), Status::Closed);

    let err = decode::<Status>(&json!("Archived")).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownVariant { .. }));
}

#[test]
fn test_tagged_union_discriminator() {
    let circle = encode(&Shape::Circle { radius: 1.5 }).unwrap();
    assert_eq!(circle, json!({"#class": "Circle", "radius": 1.5}));
    assert_eq!(circle[CLASS_FIELD], json!("Circle"));
    assert_eq!(
        encode(&Shape::Empty).unwrap(),
        json!({"#class": "Empty"})
    );

    let rect: Shape = decode(&json!({"#class": "Rect", "width": 2.0, "height": 3.0})).unwrap();
    assert_eq!(
        rect,
        Shape::Rect {
            width: 2.0,
            height: 3.0
        }
    );
}

#[test]
fn test_union_discriminator_is_authoritative() {
    // Fields of Circle, tag of Rect: decoding follows the tag.
    let err = decode::<Shape>(&json!({"#class": "Rect", "radius": 1.0})).unwrap_err();
    assert_eq!(err.missing_field_name(), Some("width"));

    let err = decode::<Shape>(&json!({"radius": 1.0})).unwrap_err();
    assert!(matches!(err, DecodeError::MissingDiscriminator { .. }));

    let err = decode::<Shape>(&json!({"#class": "Triangle"})).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownVariant { .. }));
}

#[test]
fn test_generic_record_resolves_parameter() {
    let page = Page {
        items: vec![Divide { a: 1, b: 1 }],
        total: 1,
    };
    let value = encode(&page).unwrap();
    assert_eq!(value, json!({"items": [{"a": 1, "b": 1}], "total": 1}));
    assert_eq!(decode::<Page<Divide>>(&value).unwrap(), page);

    let declared = Page::<Divide>::descriptor();
    assert!(declared.validate().is_err());
    let resolved = descriptor_of::<Page<Divide>>();
    resolved.validate().unwrap();
    assert_eq!(resolved.to_string(), "Page<Divide>");

    let TypeDescriptor::Record(record) = resolved else {
        panic!("expected a record descriptor");
    };
    assert_eq!(
        record.field("items").map(|f| f.descriptor.to_string()),
        Some("List<Divide>".to_string())
    );
}

#[test]
fn test_generic_error_path_inside_items() {
    let err = decode::<Page<Divide>>(&json!({"items": [{"a": 1, "b": 1}, {"a": 1}], "total": 2}))
        .unwrap_err();
    assert_eq!(err.path(), "$.items[1]");
    assert_eq!(err.missing_field_name(), Some("b"));
}

#[test]
fn test_maps_timestamps_and_enums_in_records() {
    let created = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    let submission = Submission {
        id: 3,
        status: Status::Open,
        tags: BTreeMap::from([("lint".to_string(), 2), ("build".to_string(), 0)]),
        created,
    };
    let value = encode(&submission).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 3,
            "status": "Open",
            "tags": [["build", 0], ["lint", 2]],
            "created": 1_700_000_000_123_i64,
        })
    );
    assert_eq!(decode::<Submission>(&value).unwrap(), submission);
}

#[test]
fn test_duplicate_map_keys_rejected() {
    let err = decode::<Submission>(&json!({
        "id": 1,
        "status": "Open",
        "tags": [["a", 1], ["a", 2]],
        "created": 0,
    }))
    .unwrap_err();
    assert!(matches!(err, DecodeError::DuplicateKey { .. }));
}

#[test]
fn test_newtype_and_unit_struct() {
    assert_eq!(encode(&Revision("abc".into())).unwrap(), json!("abc"));
    assert_eq!(
        Revision::descriptor(),
        TypeDescriptor::Primitive(verticore::codec::PrimitiveKind::String)
    );
    assert_eq!(encode(&Marker).unwrap(), json!({}));
    assert_eq!(decode::<Marker>(&Value::Null).unwrap(), Marker);
}

#[test]
fn test_conform_agrees_with_static_decode() {
    let descriptor = descriptor_of::<Profile>();
    let inputs = [
        json!({"login": "ann", "email": null, "extra": 1}),
        json!({"email": "x"}),
        json!({"login": 5, "email": null}),
        json!("profile"),
    ];
    for input in inputs {
        match (decode::<Profile>(&input), conform(&input, &descriptor)) {
            (Ok(profile), Ok(normalized)) => {
                assert_eq!(encode(&profile).unwrap(), normalized);
            }
            (Err(static_err), Err(dynamic_err)) => assert_eq!(static_err, dynamic_err),
            (left, right) => panic!("disagreement on {input}: {left:?} vs {right:?}"),
        }
    }
}

#[test]
fn test_conform_normalizes_union() {
    let descriptor = descriptor_of::<Shape>();
    let normalized = conform(&json!({"radius": 2, "#class": "Circle"}), &descriptor).unwrap();
    assert_eq!(
        serde_json::to_string(&normalized).unwrap(),
        r##"{"#class":"Circle","radius":2}"##
    );
}

#[test]
fn test_descriptor_cache_memoizes() {
    let cache = DescriptorCache::new();
    let first = cache.get_or_resolve::<Page<Divide>>();
    let second = cache.get_or_resolve::<Page<Divide>>();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    let _ = cache.get_or_resolve::<Page<String>>();
    assert_eq!(cache.len(), 2);
}
