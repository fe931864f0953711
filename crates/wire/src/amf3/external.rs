//! Externalizable object layouts
//!
//! An externalizable class writes its own payload, so the codec can only
//! read classes whose layout it knows. Two shapes are supported:
//!
//! - single value: the payload is one AMF3 value (collection wrappers and
//!   object proxies)
//! - flag groups: the Flex "small message" encoding. Each group is a run of
//!   flag bytes (bit 7 set = another byte follows) and then one value for
//!   every set bit 0..=6, byte by byte. Set bits without a known name become
//!   members named `flag<group>.<byte>.<bit>` so they survive re-encoding.

use super::{Amf3Decoder, Amf3Encoder};
use amfxml_core::{AliasRegistry, Error, Result, Traits, TypedObject, Value};

/// Bit names of one flag group, byte by byte
type Group = &'static [&'static [&'static str]];

const ABSTRACT: Group = &[
    &[
        "body",
        "clientId",
        "destination",
        "headers",
        "messageId",
        "timestamp",
        "timeToLive",
    ],
    &["clientIdBytes", "messageIdBytes"],
];
const ASYNC: Group = &[&["correlationId", "correlationIdBytes"]];
const ACKNOWLEDGE: Group = &[];
const COMMAND: Group = &[&["operation"]];

const ACKNOWLEDGE_MESSAGE: &[Group] = &[ABSTRACT, ASYNC, ACKNOWLEDGE];
const COMMAND_MESSAGE: &[Group] = &[ABSTRACT, ASYNC, COMMAND];
const ASYNC_MESSAGE: &[Group] = &[ABSTRACT, ASYNC];

const MORE_FLAGS: u8 = 0x80;

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// One value stored under the given member name
    Single(&'static str),
    /// Flex small message flag groups
    Flags(&'static [Group]),
}

fn known_layout(class_name: &str) -> Option<Layout> {
    match class_name {
        "flex.messaging.io.ArrayCollection"
        | "mx.collections.ArrayCollection"
        | "mx.collections.ArrayList" => Some(Layout::Single("source")),
        "flex.messaging.io.ObjectProxy" | "mx.utils.ObjectProxy" => {
            Some(Layout::Single("object"))
        }
        "DSK" | "flex.messaging.messages.AcknowledgeMessageExt" => {
            Some(Layout::Flags(ACKNOWLEDGE_MESSAGE))
        }
        "DSC" | "flex.messaging.messages.CommandMessageExt" => {
            Some(Layout::Flags(COMMAND_MESSAGE))
        }
        "DSA" | "flex.messaging.messages.AsyncMessageExt" => Some(Layout::Flags(ASYNC_MESSAGE)),
        _ => None,
    }
}

/// Find the layout by qualified name, falling back to the registered alias
fn layout_for(traits: &Traits, registry: &AliasRegistry) -> Option<Layout> {
    known_layout(&traits.class_name)
        .or_else(|| known_layout(&registry.compress_or_self(&traits.class_name)))
}

fn member_name(group: Group, g: usize, byte: usize, bit: usize) -> String {
    group
        .get(byte)
        .and_then(|names| names.get(bit))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("flag{}.{}.{}", g, byte, bit))
}

/// Read the payload of an externalizable object
pub(super) fn read_external(
    decoder: &mut Amf3Decoder<'_, '_>,
    traits: &Traits,
    at: usize,
) -> Result<Vec<(String, Value)>> {
    let layout = layout_for(traits, decoder.registry()).ok_or_else(|| {
        Error::malformed(
            at,
            format!(
                "externalizable class {:?} has no known layout",
                traits.class_name
            ),
        )
    })?;

    match layout {
        Layout::Single(name) => Ok(vec![(name.to_string(), decoder.read_value()?)]),
        Layout::Flags(groups) => {
            let mut fields = Vec::new();
            for (g, group) in groups.iter().enumerate() {
                let mut flags = Vec::new();
                loop {
                    let b = decoder.reader().read_u8()?;
                    flags.push(b);
                    if b & MORE_FLAGS == 0 {
                        break;
                    }
                }
                for (byte, bits) in flags.iter().enumerate() {
                    for bit in 0..7 {
                        if bits & (1 << bit) != 0 {
                            let member = decoder.read_value()?;
                            fields.push((member_name(group, g, byte, bit), member));
                        }
                    }
                }
            }
            Ok(fields)
        }
    }
}

/// Write the payload of an externalizable object
pub(super) fn write_external(encoder: &mut Amf3Encoder<'_>, object: &TypedObject) -> Result<()> {
    let traits = &object.traits;
    let layout = layout_for(traits, encoder.registry()).ok_or_else(|| {
        Error::Unencodable(format!(
            "externalizable class {:?} has no known layout",
            traits.class_name
        ))
    })?;

    match layout {
        Layout::Single(name) => match object.fields.as_slice() {
            [(field, member)] if field == name => encoder.write_value(member),
            _ => Err(Error::Unencodable(format!(
                "{} must carry exactly one member named {}",
                traits.class_name, name
            ))),
        },
        Layout::Flags(groups) => {
            let mut written = 0;
            for (g, group) in groups.iter().enumerate() {
                let members = group_members(object, group, g);
                written += members.len();

                let bytes = members
                    .iter()
                    .map(|(byte, _, _)| byte + 1)
                    .max()
                    .unwrap_or(1);
                let mut flags = vec![0u8; bytes];
                for (byte, bit, _) in &members {
                    flags[*byte] |= 1 << bit;
                }
                let last = flags.len() - 1;
                for (i, b) in flags.iter().enumerate() {
                    encoder
                        .writer()
                        .put_u8(if i < last { b | MORE_FLAGS } else { *b });
                }
                for (_, _, member) in &members {
                    encoder.write_value(member)?;
                }
            }
            if written != object.fields.len() {
                return Err(Error::Unencodable(format!(
                    "{} carries members outside its flag layout",
                    traits.class_name
                )));
            }
            Ok(())
        }
    }
}

/// Members of one group as `(byte, bit, value)`, in wire order
fn group_members<'o>(
    object: &'o TypedObject,
    group: Group,
    g: usize,
) -> Vec<(usize, usize, &'o Value)> {
    let mut members = Vec::new();
    for (name, member) in &object.fields {
        if let Some((byte, bit)) = bit_of(name, group, g) {
            members.push((byte, bit, member));
        }
    }
    members.sort_by_key(|(byte, bit, _)| (*byte, *bit));
    members
}

fn bit_of(name: &str, group: Group, g: usize) -> Option<(usize, usize)> {
    for (byte, names) in group.iter().enumerate() {
        if let Some(bit) = names.iter().position(|n| *n == name) {
            return Some((byte, bit));
        }
    }
    let rest = name.strip_prefix("flag")?;
    let mut parts = rest.splitn(3, '.');
    let group_index: usize = parts.next()?.parse().ok()?;
    let byte: usize = parts.next()?.parse().ok()?;
    let bit: usize = parts.next()?.parse().ok()?;
    if group_index != g || bit >= 7 || byte > 64 {
        return None;
    }
    // a numbered member must not shadow a named bit
    if group.get(byte).is_some_and(|names| bit < names.len()) {
        return None;
    }
    Some((byte, bit))
}
