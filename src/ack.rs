//! Acknowledgment detection
//!
//! A pure acknowledgment carries nothing a user wants to edit, so the
//! converter can skip rendering it. The check is a heuristic: a message with
//! no bodies, or a single body whose payload is (or starts with) an object
//! tagged with one of [`ACK_CODES`].

use amfxml_core::{ActionMessage, AliasRegistry, Value};

/// Class codes of Flex small-message acknowledgments and commands
pub const ACK_CODES: [&str; 2] = ["DSC", "DSK"];

/// Check whether `message` is a pure acknowledgment.
///
/// Class names are compressed through `registry` first, so both the short
/// code and a registered qualified name match.
pub fn is_acknowledgment(message: &ActionMessage, registry: &AliasRegistry) -> bool {
    match message.bodies.as_slice() {
        [] => true,
        [body] => is_ack_payload(&body.data, registry),
        _ => false,
    }
}

fn is_ack_payload(data: &Value, registry: &AliasRegistry) -> bool {
    let first = match data {
        Value::DenseArray(items) => match items.borrow().first() {
            Some(first) => first.clone(),
            None => return false,
        },
        other => other.clone(),
    };

    match first.as_object() {
        Some(object) => {
            let object = object.borrow();
            let code = registry.compress_or_self(object.class_name());
            ACK_CODES.contains(&code.as_ref())
        }
        None => false,
    }
}
