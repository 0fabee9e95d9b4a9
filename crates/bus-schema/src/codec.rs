//! Encoding/decoding a full event payload (`event_id FS arg_block`)
//! against the catalog, combining `bus-codec`'s type-agnostic framing
//! primitives with this crate's [`Event`] schema.

use std::collections::HashMap;

use bus_codec::{decode_arg_block, decode_value, encode_arg_block, encode_value, Value};

use crate::error::CodecError;
use crate::event::Event;
use crate::Catalog;

/// Encodes `event` with the given named arguments into the payload
/// half of a frame (everything after the routing prefix's FS).
/// Fails if a declared argument is missing or an extra one is
/// supplied.
pub fn encode_event(event: &Event, kwargs: &HashMap<String, Value>) -> Result<String, CodecError> {
    if kwargs.len() > event.args.len() {
        for key in kwargs.keys() {
            if !event.args.iter().any(|a| &a.name == key) {
                return Err(CodecError::ExtraArgument {
                    event: event.name.clone(),
                    arg: key.clone(),
                });
            }
        }
    }
    let mut entries = Vec::with_capacity(event.args.len());
    for arg in &event.args {
        let value = kwargs.get(&arg.name).ok_or_else(|| CodecError::MissingArgument {
            event: event.name.clone(),
            arg: arg.name.clone(),
        })?;
        let encoded = encode_value(value, &arg.type_name)?;
        entries.push((arg.id, encoded));
    }
    let arg_block = encode_arg_block(&entries);
    Ok(format!("{:05x}\u{1c}{arg_block}", event.id))
}

/// Decodes a frame payload against `catalog`, returning the resolved
/// [`Event`] and its named arguments.
pub fn decode_event(
    catalog: &Catalog,
    payload: &str,
) -> Result<(Event, HashMap<String, Value>), CodecError> {
    let (event_id_hex, arg_block) = payload
        .split_once('\u{1c}')
        .ok_or_else(|| CodecError::Malformed(payload.to_string()))?;
    let event_id = u32::from_str_radix(event_id_hex, 16)
        .map_err(|_| CodecError::Malformed(payload.to_string()))?;
    let event = catalog.lookup_by_id(event_id)?;

    let entries = decode_arg_block(arg_block)?;
    let mut kwargs = HashMap::with_capacity(entries.len());
    for (arg_id, raw) in entries {
        let arg = event
            .args
            .iter()
            .find(|a| a.id == arg_id)
            .ok_or_else(|| CodecError::UnknownArgId {
                event: event.name.clone(),
                arg_id,
            })?;
        kwargs.insert(arg.name.clone(), decode_value(&raw, &arg.type_name)?);
    }
    Ok((event, kwargs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventArg;

    fn sample_catalog() -> Catalog {
        Catalog::from_events(vec![Event::new(
            "server.ping",
            1,
            vec![EventArg::new("server_name", "string", 1)],
            "string",
        )])
        .unwrap()
    }

    #[test]
    fn round_trips_through_catalog() {
        let catalog = sample_catalog();
        let event = catalog.lookup_by_name("server.ping").unwrap();
        let mut kwargs = HashMap::new();
        kwargs.insert("server_name".to_string(), Value::Str("srv1".to_string()));

        let payload = encode_event(&event, &kwargs).unwrap();
        let (decoded_event, decoded_args) = decode_event(&catalog, &payload).unwrap();
        assert_eq!(decoded_event, event);
        assert_eq!(decoded_args, kwargs);
    }

    #[test]
    fn rejects_missing_argument() {
        let catalog = sample_catalog();
        let event = catalog.lookup_by_name("server.ping").unwrap();
        let kwargs = HashMap::new();
        assert!(matches!(
            encode_event(&event, &kwargs),
            Err(CodecError::MissingArgument { .. })
        ));
    }

    #[test]
    fn rejects_extra_argument() {
        let catalog = sample_catalog();
        let event = catalog.lookup_by_name("server.ping").unwrap();
        let mut kwargs = HashMap::new();
        kwargs.insert("server_name".to_string(), Value::Str("srv1".to_string()));
        kwargs.insert("extra".to_string(), Value::Int(1));
        assert!(matches!(
            encode_event(&event, &kwargs),
            Err(CodecError::ExtraArgument { .. })
        ));
    }
}
