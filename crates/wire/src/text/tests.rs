use super::*;
use crate::amf3::{decode_value, encode_value};
use amfxml_core::{Framing, MessageBody, MessageHeader, Traits, TypedObject};
use serde_json::json;
use std::rc::Rc;

fn to_tree(value: &Value) -> TextTree {
    value_to_tree(value, &AliasRegistry::new())
}

fn from_tree(tree: TextTree) -> Value {
    tree_to_value(&tree, &AliasRegistry::new()).unwrap()
}

fn from_tree_err(tree: TextTree) -> Error {
    tree_to_value(&tree, &AliasRegistry::new()).unwrap_err()
}

mod scalar_tests {
    use super::*;

    #[test]
    fn test_integer_and_double_stay_distinct() {
        assert_eq!(to_tree(&Value::Integer(7)), json!(7));
        assert_eq!(render(&to_tree(&Value::Double(7.0)), false), "7.0");
        assert_eq!(from_tree(json!(7)), Value::Integer(7));
        assert_eq!(from_tree(json!(7.0)), Value::Double(7.0));
    }

    #[test]
    fn test_special_doubles() {
        let cases = [
            (f64::NAN, "NaN"),
            (f64::INFINITY, "+Inf"),
            (f64::NEG_INFINITY, "-Inf"),
            (-0.0, "-0.0"),
        ];
        for (d, literal) in cases {
            let tree = to_tree(&Value::Double(d));
            assert_eq!(tree, json!({ "$f64": literal }));
            let back = from_tree(tree).as_double().unwrap();
            assert_eq!(back.to_bits(), d.to_bits());
        }
        assert!(from_tree_err(json!({ "$f64": "Infinity" })).is_unparseable());
    }

    #[test]
    fn test_null_undefined_bool_string() {
        assert_eq!(to_tree(&Value::Null), json!(null));
        assert_eq!(to_tree(&Value::Undefined), json!({ "$undefined": true }));
        assert_eq!(to_tree(&Value::Boolean(true)), json!(true));
        assert_eq!(to_tree(&Value::string("hi")), json!("hi"));
        assert_eq!(from_tree(json!({ "$undefined": true })), Value::Undefined);
        assert!(from_tree_err(json!({ "$undefined": false })).is_unparseable());
    }

    #[test]
    fn test_out_of_range_integers_become_doubles() {
        assert_eq!(from_tree(json!(268_435_455)), Value::Integer(268_435_455));
        assert_eq!(from_tree(json!(268_435_456)), Value::Double(268_435_456.0));
        assert_eq!(from_tree(json!(-268_435_457)), Value::Double(-268_435_457.0));
        assert_eq!(
            from_tree(json!(u64::MAX)),
            Value::Double(u64::MAX as f64)
        );
    }

    #[test]
    fn test_dates() {
        assert_eq!(to_tree(&Value::date(1000.0)), json!({ "$date": 1000.0 }));
        assert_eq!(from_tree(json!({ "$date": 1000 })), Value::date(1000.0));
        assert_eq!(
            from_tree(json!({ "$date": "1970-01-02T00:00:00Z" })),
            Value::date(86_400_000.0)
        );
        assert_eq!(
            to_tree(&Value::date(f64::INFINITY)),
            json!({ "$date": { "$f64": "+Inf" } })
        );
        assert!(from_tree_err(json!({ "$date": "yesterday" })).is_unparseable());
    }

    #[test]
    fn test_bytes_and_xml() {
        assert_eq!(
            to_tree(&Value::bytes(vec![1, 2, 3])),
            json!({ "$bytes": "AQID" })
        );
        assert_eq!(from_tree(json!({ "$bytes": "AQID" })), Value::bytes(vec![1, 2, 3]));
        assert!(from_tree_err(json!({ "$bytes": "not base64!" })).is_unparseable());

        assert_eq!(to_tree(&Value::xml("<a/>")), json!({ "$xml": "<a/>" }));
        assert_eq!(to_tree(&Value::e4x("<a/>")), json!({ "$e4x": "<a/>" }));
        assert_eq!(from_tree(json!({ "$e4x": "<b/>" })), Value::e4x("<b/>"));
    }
}

mod structure_tests {
    use super::*;

    #[test]
    fn test_arrays() {
        let dense = Value::dense(vec![Value::Integer(1), Value::string("a")]);
        assert_eq!(to_tree(&dense), json!([1, "a"]));
        assert_eq!(from_tree(json!([1, "a"])), dense);

        let assoc = Value::assoc(vec![("k".into(), Value::Boolean(false))], vec![Value::Null]);
        let tree = to_tree(&assoc);
        assert_eq!(tree, json!({ "$assoc": { "k": false }, "$array": [null] }));
        assert_eq!(from_tree(tree), assoc);
        assert_eq!(
            from_tree(json!({ "$assoc": { "k": 1 } })),
            Value::assoc(vec![("k".into(), Value::Integer(1))], vec![])
        );
    }

    #[test]
    fn test_typed_object() {
        let ping = Value::object("com.example.Ping", vec![("count", Value::Integer(7))]);
        let tree = to_tree(&ping);
        assert_eq!(
            tree,
            json!({ "$class": "com.example.Ping", "$sealed": { "count": 7 } })
        );
        assert_eq!(from_tree(tree), ping);
    }

    #[test]
    fn test_dynamic_members() {
        let value = Value::from_object(TypedObject {
            traits: Rc::new(Traits {
                class_name: "C".into(),
                sealed: vec!["a".into()],
                dynamic: true,
                externalizable: false,
            }),
            fields: vec![
                ("a".into(), Value::Integer(1)),
                ("b".into(), Value::Integer(2)),
            ],
        });
        let tree = to_tree(&value);
        assert_eq!(
            tree,
            json!({ "$class": "C", "$sealed": { "a": 1 }, "$dynamic": { "b": 2 } })
        );
        assert_eq!(from_tree(tree), value);
        assert!(from_tree_err(
            json!({ "$class": "C", "$sealed": { "a": 1 }, "$dynamic": { "a": 2 } })
        )
        .is_unparseable());
    }

    #[test]
    fn test_plain_object_is_anonymous_dynamic() {
        let value = from_tree(json!({ "x": 1, "y": [true] }));
        let object = value.as_object().unwrap().borrow();
        assert!(object.traits.is_anonymous());
        assert!(object.traits.dynamic);
        assert_eq!(object.fields[0].0, "x");
        assert_eq!(object.get("y"), Some(&Value::dense(vec![Value::Boolean(true)])));
    }

    #[test]
    fn test_objects_of_one_shape_share_traits() {
        let value = from_tree(json!([
            { "$class": "P", "$sealed": { "n": 1 } },
            { "$class": "P", "$sealed": { "n": 2 } },
        ]));
        let items = value.as_dense().unwrap().borrow();
        let a = items[0].as_object().unwrap().borrow();
        let b = items[1].as_object().unwrap().borrow();
        assert!(Rc::ptr_eq(&a.traits, &b.traits));
    }

    #[test]
    fn test_class_tags_use_aliases() {
        let registry = AliasRegistry::new();
        registry
            .register("PING", "com.example.Ping")
            .unwrap();
        let ping = Value::object("com.example.Ping", vec![("count", Value::Integer(7))]);

        let tree = value_to_tree(&ping, &registry);
        assert_eq!(tree["$class"], json!("PING"));
        assert_eq!(tree_to_value(&tree, &registry).unwrap(), ping);

        // unregistered tags are taken as qualified names
        let other = tree_to_value(&json!({ "$class": "x.Y", "$sealed": {} }), &registry).unwrap();
        assert_eq!(other.as_object().unwrap().borrow().class_name(), "x.Y");
    }

    #[test]
    fn test_flex_messages_get_short_tags() {
        let registry = AliasRegistry::new();
        let remoting = Value::object(
            "flex.messaging.messages.RemotingMessage",
            vec![("operation", Value::string("getItems"))],
        );

        let tree = value_to_tree(&remoting, &registry);
        assert_eq!(tree["$class"], json!("RemotingMessage"));
        assert_eq!(tree_to_value(&tree, &registry).unwrap(), remoting);

        // bytes keep the qualified name
        let bytes = encode_value(&from_tree(tree), &registry).unwrap();
        let decoded = decode_value(&bytes, &registry).unwrap();
        assert_eq!(
            decoded.as_object().unwrap().borrow().class_name(),
            "flex.messaging.messages.RemotingMessage"
        );
        for (short, qualified) in MESSAGE_TAGS {
            let tree = json!({ "$class": short, "$sealed": {} });
            let value = tree_to_value(&tree, &registry).unwrap();
            assert_eq!(value.as_object().unwrap().borrow().class_name(), qualified);
        }
    }

    #[test]
    fn test_registry_wins_over_short_tags() {
        let registry = AliasRegistry::new();
        registry
            .register("RM", "flex.messaging.messages.RemotingMessage")
            .unwrap();
        registry
            .register("ErrorMessage", "com.example.ErrorMessage")
            .unwrap();

        let remoting = Value::object(
            "flex.messaging.messages.RemotingMessage",
            vec![("operation", Value::Null)],
        );
        assert_eq!(value_to_tree(&remoting, &registry)["$class"], json!("RM"));

        let tree = json!({ "$class": "ErrorMessage", "$sealed": {} });
        let error = tree_to_value(&tree, &registry).unwrap();
        assert_eq!(
            error.as_object().unwrap().borrow().class_name(),
            "com.example.ErrorMessage"
        );
    }
}

mod identity_tests {
    use super::*;

    #[test]
    fn test_shared_value_gets_id_and_ref() {
        let shared = Value::bytes(vec![1]);
        let value = Value::dense(vec![shared.clone(), Value::Null, shared]);
        let tree = to_tree(&value);
        assert_eq!(
            tree,
            json!([{ "$id": 1, "$bytes": "AQ==" }, null, { "$ref": 1 }])
        );

        let back = from_tree(tree);
        let items = back.as_dense().unwrap().borrow();
        assert!(items[0].ptr_eq(&items[2]));
    }

    #[test]
    fn test_shared_dense_array() {
        let inner = Value::dense(vec![Value::Integer(1)]);
        let value = Value::anonymous(vec![("a", inner.clone()), ("b", inner)]);
        let tree = to_tree(&value);
        assert_eq!(
            tree["$dynamic"],
            json!({ "a": { "$id": 1, "$array": [1] }, "b": { "$ref": 1 } })
        );
        let back = from_tree(tree);
        let object = back.as_object().unwrap().borrow();
        assert!(object.get("a").unwrap().ptr_eq(object.get("b").unwrap()));
    }

    #[test]
    fn test_self_reference() {
        let value = Value::anonymous::<String>(vec![]);
        value.as_object().unwrap().borrow_mut().set("me", value.clone());

        let tree = to_tree(&value);
        assert_eq!(
            tree,
            json!({
                "$id": 1,
                "$class": "",
                "$sealed": {},
                "$dynamic": { "me": { "$ref": 1 } },
            })
        );

        let back = from_tree(tree);
        let object = back.as_object().unwrap().borrow();
        assert!(object.get("me").unwrap().ptr_eq(&back));
    }

    #[test]
    fn test_unique_values_carry_no_id() {
        let value = Value::dense(vec![Value::bytes(vec![1]), Value::bytes(vec![1])]);
        assert_eq!(
            to_tree(&value),
            json!([{ "$bytes": "AQ==" }, { "$bytes": "AQ==" }])
        );
    }

    #[test]
    fn test_reference_errors() {
        assert!(from_tree_err(json!({ "$ref": 4 })).is_unparseable());
        assert!(from_tree_err(json!([
            { "$id": 1, "$bytes": "" },
            { "$id": 1, "$bytes": "" },
        ]))
        .is_unparseable());
        assert!(from_tree_err(json!({ "$ref": 1, "$id": 2 })).is_unparseable());
    }
}

mod malformed_tests {
    use super::*;

    #[test]
    fn test_unknown_wrapper_keys() {
        let err = from_tree_err(json!({ "$weird": 1 }));
        assert!(err.is_unparseable());
        assert!(from_tree_err(json!({ "$class": "C", "$sealed": {}, "x": 1 })).is_unparseable());
        assert!(from_tree_err(json!({ "$bytes": "", "$xml": "" })).is_unparseable());
    }

    #[test]
    fn test_wrong_member_types() {
        assert!(from_tree_err(json!({ "$class": 5, "$sealed": {} })).is_unparseable());
        assert!(from_tree_err(json!({ "$class": "C", "$sealed": [] })).is_unparseable());
        assert!(from_tree_err(json!({ "$array": {} })).is_unparseable());
        assert!(from_tree_err(json!({ "$xml": 1 })).is_unparseable());
    }

    #[test]
    fn test_invalid_json_text() {
        let err = text_to_value("{not json", &AliasRegistry::new()).unwrap_err();
        assert!(err.is_unparseable());
    }
}

mod depth_tests {
    use super::*;
    use crate::amf3::MAX_DEPTH;

    /// `levels` objects, each holding the next in a sealed member
    fn nested_objects(levels: usize) -> Value {
        let mut value = Value::Undefined;
        for _ in 0..levels {
            value = Value::object("N", vec![("next", value)]);
        }
        value
    }

    fn nested_arrays(levels: usize) -> Value {
        let mut value = Value::Integer(1);
        for _ in 0..levels {
            value = Value::dense(vec![value]);
        }
        value
    }

    // Every stage recurses once per level
    fn on_large_stack(test: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new()
            .stack_size(256 << 20)
            .spawn(test)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_deepest_values_read_back() {
        on_large_stack(|| {
            let registry = AliasRegistry::new();
            for value in [nested_objects(MAX_DEPTH), nested_arrays(MAX_DEPTH)] {
                let bytes = encode_value(&value, &registry).unwrap();
                let decoded = decode_value(&bytes, &registry).unwrap();
                for pretty in [false, true] {
                    let text = value_to_text(&decoded, &registry, pretty);
                    let reread = text_to_value(&text, &registry).unwrap();
                    assert_eq!(encode_value(&reread, &registry).unwrap(), bytes);
                }

                let mut message = ActionMessage::default();
                message.bodies.push(MessageBody::new("x", "y", decoded));
                let text = message_to_text(&message, &registry, false);
                let reread = text_to_message(&text, &registry).unwrap();
                assert_eq!(
                    crate::amf0::encode_message(&reread, &registry).unwrap(),
                    crate::amf0::encode_message(&message, &registry).unwrap()
                );
            }
        });
    }

    #[test]
    fn test_one_level_too_deep() {
        on_large_stack(|| {
            let registry = AliasRegistry::new();
            for value in [nested_objects(MAX_DEPTH + 1), nested_arrays(MAX_DEPTH + 1)] {
                let text = value_to_text(&value, &registry, false);
                let err = text_to_value(&text, &registry).unwrap_err();
                assert!(err.is_unparseable());
                assert!(err.to_string().contains("nesting"));
            }
        });
    }

    #[test]
    fn test_runaway_brackets_rejected_before_parsing() {
        let text = "[".repeat(1_000_000);
        let err = text_to_value(&text, &AliasRegistry::new()).unwrap_err();
        assert!(err.to_string().contains(&MAX_TEXT_DEPTH.to_string()));
    }

    #[test]
    fn test_brackets_inside_strings_do_not_count() {
        let noise = "[{\\\"".repeat(MAX_TEXT_DEPTH);
        let text = json!([noise]).to_string();
        let value = text_to_value(&text, &AliasRegistry::new()).unwrap();
        let items = value.as_dense().unwrap().borrow();
        assert_eq!(items[0], Value::string(noise.as_str()));
    }
}

mod external_tests {
    use super::*;

    #[test]
    fn test_small_message_text_round_trip() {
        let bytes = [
            0x0A, 0x07, 0x07, b'D', b'S', b'K', 0x10, 0x06, 0x05, b'm', b'1', 0x01, 0x06, 0x05,
            b'c', b'1', 0x00,
        ];
        let registry = AliasRegistry::new();
        let value = decode_value(&bytes, &registry).unwrap();
        let tree = value_to_tree(&value, &registry);
        assert_eq!(
            tree,
            json!({
                "$class": "DSK",
                "$external": { "messageId": "m1", "correlationId": "c1" },
            })
        );

        let back = tree_to_value(&tree, &registry).unwrap();
        assert_eq!(encode_value(&back, &registry).unwrap(), bytes);
    }

    #[test]
    fn test_external_cannot_mix_with_sealed() {
        assert!(from_tree_err(json!({ "$class": "DSK", "$external": {}, "$sealed": {} }))
            .is_unparseable());
        assert!(from_tree_err(json!({ "$class": "C", "$traits": [], "$sealed": {} }))
            .is_unparseable());
    }

    #[test]
    fn test_declared_traits_need_not_match_members() {
        let value = from_tree(json!({
            "$class": "DSK",
            "$traits": ["a", "b"],
            "$external": { "messageId": "m1" },
        }));
        let object = value.as_object().unwrap().borrow();
        assert_eq!(object.traits.sealed, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(object.fields.len(), 1);
    }
}

mod message_tests {
    use super::*;

    fn ping_message() -> ActionMessage {
        ActionMessage::new(3).with_body(MessageBody::new(
            "x",
            "y",
            Value::object("com.example.Ping", vec![("count", Value::Integer(7))]),
        ))
    }

    #[test]
    fn test_message_tree_shape() {
        let tree = message_to_tree(&ping_message(), &AliasRegistry::new());
        assert_eq!(
            tree,
            json!({
                "version": 3,
                "headers": [],
                "bodies": [{
                    "targetUri": "x",
                    "responseUri": "y",
                    "data": { "$class": "com.example.Ping", "$sealed": { "count": 7 } },
                }],
            })
        );
        assert_eq!(
            tree_to_message(&tree, &AliasRegistry::new()).unwrap(),
            ping_message()
        );
    }

    #[test]
    fn test_framing_and_headers() {
        let message = ActionMessage::new(3)
            .with_header(
                MessageHeader::new("DSId", true, Value::string("nil")).with_framing(Framing::Amf0),
            )
            .with_body(
                MessageBody::new("svc", "/1", Value::dense(vec![]))
                    .with_framing(Framing::StrictArray),
            );
        let tree = message_to_tree(&message, &AliasRegistry::new());
        assert_eq!(tree["headers"][0]["framing"], json!("amf0"));
        assert_eq!(tree["headers"][0]["mustUnderstand"], json!(true));
        assert_eq!(tree["bodies"][0]["framing"], json!("strict-array"));
        assert_eq!(
            tree_to_message(&tree, &AliasRegistry::new()).unwrap(),
            message
        );
    }

    #[test]
    fn test_each_value_has_its_own_ids() {
        let shared = Value::bytes(vec![7]);
        let value = Value::dense(vec![shared.clone(), shared]);
        let message = ActionMessage::new(3)
            .with_body(MessageBody::new("a", "b", value.clone()))
            .with_body(MessageBody::new("c", "d", value));
        let tree = message_to_tree(&message, &AliasRegistry::new());
        assert_eq!(tree["bodies"][0]["data"][0]["$id"], json!(1));
        assert_eq!(tree["bodies"][1]["data"][0]["$id"], json!(1));
    }

    #[test]
    fn test_message_defaults_and_errors() {
        let message = tree_to_message(&json!({}), &AliasRegistry::new()).unwrap();
        assert_eq!(message, ActionMessage::default());

        let bad = [
            json!([]),
            json!({ "version": 70000 }),
            json!({ "bodies": [{ "targetUri": "x", "data": null }] }),
            json!({ "bodies": [{ "targetUri": "x", "responseUri": "y" }] }),
            json!({ "headers": [{ "name": "h", "value": 1, "framing": "amf4" }] }),
        ];
        for tree in bad {
            assert!(tree_to_message(&tree, &AliasRegistry::new())
                .unwrap_err()
                .is_unparseable());
        }
    }

    #[test]
    fn test_text_bytes_text_is_stable() {
        let text = r#"{
            "version": 3,
            "bodies": [{
                "targetUri": "svc.op",
                "responseUri": "/1",
                "framing": "strict-array",
                "data": [
                    { "$id": 1, "$class": "com.example.Item", "$sealed": { "price": 2.5, "qty": 3 } },
                    { "$ref": 1 },
                    { "when": { "$date": "2024-05-01T12:00:00Z" }, "raw": { "$bytes": "AAEC" } }
                ]
            }]
        }"#;
        let registry = AliasRegistry::new();
        let message = text_to_message(text, &registry).unwrap();
        let bytes = crate::amf0::encode_message(&message, &registry).unwrap();
        let decoded = crate::amf0::decode_message(&bytes, &registry).unwrap();
        assert_eq!(decoded, message);

        let rendered = message_to_text(&decoded, &registry, true);
        assert_eq!(text_to_message(&rendered, &registry).unwrap(), message);
    }

    #[test]
    fn test_render_modes() {
        let tree = json!({ "a": [1, 2] });
        assert_eq!(render(&tree, false), r#"{"a":[1,2]}"#);
        assert!(render(&tree, true).contains('\n'));
    }
}
