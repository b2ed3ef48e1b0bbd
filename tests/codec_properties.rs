//! Codec laws checked over generated values.
//!
//! - `decode(encode(x)) == x` for every encodable `x`
//! - an encoded value is already in normal form: `conform(encode(x)) == encode(x)`
//! - integers outside the target width fail with `OutOfRange`

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;
use verticore::codec::{conform, decode, descriptor_of, encode, Codec, DecodeError};
use verticore::value::json;

#[derive(Debug, Clone, PartialEq, Codec)]
enum Event {
    Opened { by: String },
    Scored { points: i32, weight: f64 },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Codec)]
struct Report {
    id: u64,
    offset: i64,
    title: String,
    initial: char,
    ratio: f64,
    #[codec(optional)]
    note: Option<String>,
    reviewer: Option<String>,
    scores: Vec<i32>,
    counters: BTreeMap<String, u16>,
    span: (u8, bool),
    events: Vec<Event>,
    at: DateTime<Utc>,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ".{0,12}".prop_map(|by| Event::Opened { by }),
        (any::<i32>(), -1.0e9f64..1.0e9).prop_map(|(points, weight)| Event::Scored { points, weight }),
        Just(Event::Closed),
    ]
}

prop_compose! {
    fn report()(
        id in any::<u64>(),
        offset in any::<i64>(),
        title in ".{0,24}",
        initial in any::<char>(),
        ratio in -1.0e12f64..1.0e12,
        note in proptest::option::of(".{0,8}"),
        reviewer in proptest::option::of("[a-z]{1,8}"),
        scores in proptest::collection::vec(any::<i32>(), 0..8),
        counters in proptest::collection::btree_map("[a-z]{1,6}", any::<u16>(), 0..6),
        span in (any::<u8>(), any::<bool>()),
        events in proptest::collection::vec(event(), 0..4),
        millis in -62_000_000_000_000i64..253_000_000_000_000,
    ) -> Report {
        let at = Utc.timestamp_millis_opt(millis).single().unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
        Report { id, offset, title, initial, ratio, note, reviewer, scores, counters, span, events, at }
    }
}

proptest! {
    #[test]
    fn prop_round_trip(report in report()) {
        let value = encode(&report).unwrap();
        let decoded: Report = decode(&value).unwrap();
        prop_assert_eq!(decoded, report);
    }

    #[test]
    fn prop_encoded_values_are_normal(report in report()) {
        let value = encode(&report).unwrap();
        let normalized = conform(&value, &descriptor_of::<Report>()).unwrap();
        prop_assert_eq!(normalized, value);
    }

    #[test]
    fn prop_u8_range_enforced(n in any::<i64>()) {
        let result = decode::<u8>(&json!(n));
        if (0..=255).contains(&n) {
            prop_assert_eq!(result.unwrap(), n as u8);
        } else {
            let is_out_of_range = matches!(result, Err(DecodeError::OutOfRange { .. }));
            prop_assert!(is_out_of_range);
        }
    }

    #[test]
    fn prop_integral_floats_decode_as_integers(n in -1_000_000i32..1_000_000) {
        let decoded: i32 = decode(&json!(f64::from(n))).unwrap();
        prop_assert_eq!(decoded, n);
    }
}
