//! Converter End-to-End Tests
//!
//! Drives the public `amfxml` API the way a traffic inspector does: bytes
//! off the wire to text, edited text back to bytes.

use amfxml::prelude::*;
use std::sync::Arc;

const PING: &str = "com.example.Ping";

fn compact() -> Converter {
    Converter::builder().pretty(false).build().unwrap()
}

fn ping_message() -> ActionMessage {
    let mut message = ActionMessage::default();
    message.bodies.push(MessageBody::new(
        "x",
        "y",
        Value::object(PING, vec![("count", Value::Integer(7))]),
    ));
    message
}

// ============================================================================
// Ping Scenario
// ============================================================================

mod ping {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let converter = compact();
        let bytes = converter.encode_message(&ping_message()).unwrap();
        let decoded = converter.decode_message(&bytes).unwrap();

        assert_eq!(decoded.version, 3);
        assert!(decoded.headers.is_empty());
        assert_eq!(decoded.bodies.len(), 1);

        let body = &decoded.bodies[0];
        assert_eq!(body.target_uri, "x");
        assert_eq!(body.response_uri, "y");

        let object = body.data.as_object().unwrap().borrow();
        assert_eq!(object.class_name(), PING);
        assert_eq!(object.get("count"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_text_round_trip() {
        let converter = compact();
        let bytes = converter.encode_message(&ping_message()).unwrap();

        let text = converter.amf_message_to_text(&bytes, false).unwrap().unwrap();
        assert_eq!(
            text,
            r#"{"version":3,"headers":[],"bodies":[{"targetUri":"x","responseUri":"y","data":{"$class":"com.example.Ping","$sealed":{"count":7}}}]}"#
        );

        let reencoded = converter.text_to_amf_message(&text).unwrap();
        assert_eq!(reencoded, bytes);
        assert_eq!(converter.decode_message(&reencoded).unwrap(), ping_message());
    }

    #[test]
    fn test_edit_in_text() {
        let converter = compact();
        let bytes = converter.encode_message(&ping_message()).unwrap();
        let text = converter.amf_message_to_text(&bytes, false).unwrap().unwrap();

        let edited = text.replace(r#""count":7"#, r#""count":8"#);
        let decoded = converter
            .decode_message(&converter.text_to_amf_message(&edited).unwrap())
            .unwrap();
        let object = decoded.bodies[0].data.as_object().unwrap().borrow();
        assert_eq!(object.get("count"), Some(&Value::Integer(8)));
    }

    #[test]
    fn test_pretty_text_parses_back() {
        let converter = Converter::default();
        let bytes = converter.encode_message(&ping_message()).unwrap();
        let text = converter.amf_message_to_text(&bytes, false).unwrap().unwrap();
        assert!(text.contains('\n'));
        assert_eq!(converter.text_to_amf_message(&text).unwrap(), bytes);
    }
}

// ============================================================================
// Identity Through Text
// ============================================================================

mod identity {
    use super::*;

    #[test]
    fn test_shared_object_survives_text() {
        let converter = compact();
        let shared = Value::object(PING, vec![("count", Value::Integer(1))]);
        let pair = Value::dense(vec![shared.clone(), shared]);
        let bytes = amfxml::amfxml_wire::encode_value(&pair, converter.registry()).unwrap();

        let text = converter.amf_object_to_text(&bytes);
        assert_eq!(
            text,
            r#"[{"$id":1,"$class":"com.example.Ping","$sealed":{"count":1}},{"$ref":1}]"#
        );
        assert_eq!(converter.text_to_amf_object(&text), bytes);

        let decoded = amfxml::amfxml_wire::decode_value(&bytes, converter.registry()).unwrap();
        let items = decoded.as_dense().unwrap().borrow();
        assert!(items[0].ptr_eq(&items[1]));
    }

    #[test]
    fn test_self_reference_survives_text() {
        let converter = compact();
        let text = r#"{"$id":1,"$class":"com.example.Node","$sealed":{"next":{"$ref":1}}}"#;
        let bytes = converter.text_to_amf_object(text);
        assert!(!bytes.is_empty());
        assert_eq!(converter.amf_object_to_text(&bytes), text);
    }
}

// ============================================================================
// Acknowledgment Filter
// ============================================================================

mod acknowledgments {
    use super::*;

    fn single_body(data: Value) -> ActionMessage {
        let mut message = ActionMessage::default();
        message.bodies.push(MessageBody::new("null", "/1", data));
        message
    }

    #[test]
    fn test_small_messages_suppressed() {
        let converter = compact();
        for code in ACK_CODES {
            let ack = Value::object(code, vec![("body", Value::Null)]);
            let bytes = converter.encode_message(&single_body(ack.clone())).unwrap();
            assert_eq!(converter.amf_message_to_text(&bytes, false).unwrap(), None);

            let wrapped = converter
                .encode_message(&single_body(Value::dense(vec![ack])))
                .unwrap();
            assert_eq!(converter.amf_message_to_text(&wrapped, false).unwrap(), None);
        }
    }

    #[test]
    fn test_empty_envelope_suppressed() {
        let converter = compact();
        let bytes = converter.encode_message(&ActionMessage::default()).unwrap();
        assert_eq!(converter.amf_message_to_text(&bytes, false).unwrap(), None);
    }

    #[test]
    fn test_other_messages_rendered() {
        let converter = compact();
        let bytes = converter.encode_message(&ping_message()).unwrap();
        assert!(converter.amf_message_to_text(&bytes, false).unwrap().is_some());
    }

    #[test]
    fn test_filter_does_not_mutate() {
        let registry = AliasRegistry::new();
        let message = ping_message();
        let before = message.clone();
        assert!(!is_acknowledgment(&message, &registry));
        assert_eq!(message, before);
    }
}

// ============================================================================
// Failure Handling
// ============================================================================

mod failures {
    use super::*;

    #[test]
    fn test_every_message_prefix_fails_cleanly() {
        let converter = compact();
        let bytes = converter.encode_message(&ping_message()).unwrap();
        for len in 0..bytes.len() {
            let err = converter.amf_message_to_text(&bytes[..len], false).unwrap_err();
            assert!(err.is_malformed(), "prefix of {} bytes: {}", len, err);
        }
    }

    #[test]
    fn test_object_failures_are_empty() {
        let converter = compact();
        // String claims 64 bytes, none follow
        assert_eq!(converter.amf_object_to_text(&[0x06, 0x81, 0x01]), "");
        assert!(converter.text_to_amf_object(r#"{"$ref": 9}"#).is_empty());
    }

    #[test]
    fn test_message_failures_surface() {
        let converter = compact();
        let err = converter.text_to_amf_message(r#"{"bodies": 3}"#).unwrap_err();
        assert!(err.is_unparseable());
    }

    #[test]
    fn test_failed_render_leaves_registry_alone() {
        let converter = Converter::default();
        let err = converter.amf_message_to_text(&[0x00], true).unwrap_err();
        assert!(err.is_malformed());
        assert!(converter.registry().is_empty());
    }

    #[test]
    fn test_deep_nesting_reads_back() {
        let converter = compact();
        let mut bytes = vec![0x09, 0x03, 0x01].repeat(200);
        bytes.push(0x01);

        let text = converter.try_amf_object_to_text(&bytes).unwrap();
        assert_eq!(converter.try_text_to_amf_object(&text).unwrap(), bytes);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let converter = compact();
        let inputs: [&[u8]; 3] = [&[0x04, 0x01], &[0x0D], &[0x06, 0x05, b'h', b'i']];
        let texts: Vec<String> = inputs
            .iter()
            .map(|bytes| converter.amf_object_to_text(bytes))
            .collect();
        assert_eq!(texts, vec!["1".to_string(), String::new(), r#""hi""#.to_string()]);
    }
}

// ============================================================================
// Shared Registry
// ============================================================================

mod shared_registry {
    use super::*;

    #[test]
    fn test_converters_share_aliases() {
        let registry = Arc::new(AliasRegistry::new());
        let a = Converter::builder()
            .registry(registry.clone())
            .alias("PNG", PING)
            .pretty(false)
            .build()
            .unwrap();
        let b = Converter::builder()
            .registry(registry)
            .pretty(false)
            .build()
            .unwrap();

        let bytes = a.text_to_amf_object(r#"{"$class":"PNG","$sealed":{"count":7}}"#);
        assert_eq!(
            b.amf_object_to_text(&bytes),
            r#"{"$class":"PNG","$sealed":{"count":7}}"#
        );
    }

    #[test]
    fn test_concurrent_conversions() {
        let converter = Arc::new(compact());
        let bytes = Arc::new(converter.encode_message(&ping_message()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let converter = converter.clone();
                let bytes = bytes.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let text = converter.amf_message_to_text(&bytes, i % 2 == 0).unwrap();
                        assert!(text.is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(converter.registry().len(), RENDERING_ALIASES.len());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(json!(null)),
            any::<bool>().prop_map(|b| json!(b)),
            (-(1i64 << 28)..(1i64 << 28)).prop_map(|i| json!(i)),
            (-1e9f64..1e9).prop_map(|d| json!(d)),
            "[a-z ]{0,12}".prop_map(|s| json!(s)),
            (0i64..4_000_000_000_000).prop_map(|ms| json!({"$date": ms as f64})),
        ];
        leaf.prop_recursive(3, 32, 5, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..5).prop_map(serde_json::Value::Array),
                proptest::collection::btree_map("[a-z]{1,5}", inner, 0..4).prop_map(|fields| {
                    json!({
                        "$class": "com.example.Node",
                        "$sealed": fields.into_iter().collect::<serde_json::Map<_, _>>(),
                    })
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn text_bytes_text_is_stable(tree in arb_text()) {
            let converter = compact();
            let bytes = converter.try_text_to_amf_object(&tree.to_string()).unwrap();
            let text = converter.try_amf_object_to_text(&bytes).unwrap();
            prop_assert_eq!(converter.try_text_to_amf_object(&text).unwrap(), bytes);
        }
    }
}
