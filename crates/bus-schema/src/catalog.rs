//! Loading and looking up the read-only event [`Catalog`].
//!
//! The declarative source is TOML rather than the nested-namespace XML
//! sketched in the original: a flat `[[events]]` array whose `name`
//! field already carries the full dotted path (`"server.ping"`), since
//! TOML has no natural recursive namespace-of-namespaces shape. This
//! is the same information the original's `<namespace>` nesting
//! produces once flattened, and keeps catalog loading a single pass
//! over one table array, the way this codebase's other TOML configs
//! (`services/forwarder/src/config.rs`) are a single pass over
//! `Option`-wrapped raw fields.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::CatalogError;
use crate::event::{Event, EventArg, RESPONSE_BIT};

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: Option<String>,
    id: Option<String>,
    return_type: Option<String>,
    #[serde(default)]
    args: Vec<RawArg>,
}

#[derive(Debug, Deserialize)]
struct RawArg {
    name: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    id: Option<String>,
}

fn parse_hex(s: &str) -> Option<u32> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(s, 16).ok()
}

fn parse_hex_u8(s: &str) -> Option<u8> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u8::from_str_radix(s, 16).ok()
}

/// Read-only mapping of catalog event ids to [`Event`]s, built once at
/// startup. Response events (id with [`RESPONSE_BIT`] set) are never
/// stored here; [`Catalog::lookup_by_id`] computes them on demand.
#[derive(Debug, Clone)]
pub struct Catalog {
    by_id: HashMap<u32, Event>,
    by_name: HashMap<String, u32>,
}

impl Catalog {
    /// Loads and validates a catalog from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::load_from_str(&text)
    }

    /// Loads and validates a catalog from a TOML string.
    pub fn load_from_str(toml_str: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(toml_str).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_events(
            raw.events
                .into_iter()
                .map(resolve_event)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }

    /// Builds and validates a catalog from already-constructed events,
    /// e.g. for tests or programmatic catalogs.
    pub fn from_events(events: Vec<Event>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(events.len());
        let mut by_name = HashMap::with_capacity(events.len());
        for event in events {
            event.validate()?;
            if let Some(existing_id) = by_name.get(&event.name) {
                return Err(CatalogError::DuplicateName(format!(
                    "{} (ids {:#x} and {:#x})",
                    event.name, existing_id, event.id
                )));
            }
            if let Some(existing) = by_id.get(&event.id) {
                let existing: &Event = existing;
                return Err(CatalogError::DuplicateId(
                    event.id,
                    existing.name.clone(),
                    event.name.clone(),
                ));
            }
            by_name.insert(event.name.clone(), event.id);
            by_id.insert(event.id, event);
        }
        info!(events = by_id.len(), "catalog loaded");
        Ok(Catalog { by_id, by_name })
    }

    /// Looks up an event by id. Ids `>= RESPONSE_BIT` synthesize the
    /// response event of the corresponding catalog event.
    pub fn lookup_by_id(&self, id: u32) -> Result<Event, CatalogError> {
        if id >= RESPONSE_BIT {
            let base = self.lookup_by_id(id & 0xFFFF)?;
            return base.response_event();
        }
        self.by_id
            .get(&id)
            .cloned()
            .ok_or(CatalogError::UnknownId(id))
    }

    /// Looks up an event by its full dotted name. A `.RETURN`-suffixed
    /// name resolves to the corresponding response event.
    pub fn lookup_by_name(&self, name: &str) -> Result<Event, CatalogError> {
        if let Some(base_name) = name.strip_suffix(".RETURN") {
            let base = self.lookup_by_name(base_name)?;
            return base.response_event();
        }
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))?;
        Ok(self.by_id[id].clone())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_id.keys().copied()
    }
}

fn resolve_event(raw: RawEvent) -> Result<Event, CatalogError> {
    let name = raw.name.ok_or_else(|| CatalogError::Parse("event missing `name`".to_string()))?;
    let id_str = raw
        .id
        .ok_or_else(|| CatalogError::Parse(format!("event {name:?} missing `id`")))?;
    let id = parse_hex(&id_str)
        .ok_or_else(|| CatalogError::Parse(format!("event {name:?} has invalid hex id {id_str:?}")))?;
    let return_type = raw.return_type.unwrap_or_else(|| "None".to_string());
    let args = raw
        .args
        .into_iter()
        .map(|a| resolve_arg(&name, a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Event::new(name, id, args, return_type))
}

fn resolve_arg(event_name: &str, raw: RawArg) -> Result<EventArg, CatalogError> {
    let name = raw
        .name
        .ok_or_else(|| CatalogError::Parse(format!("event {event_name:?} has an arg missing `name`")))?;
    let type_name = raw
        .type_name
        .ok_or_else(|| CatalogError::Parse(format!("event {event_name:?} arg {name:?} missing `type`")))?;
    let id_str = raw
        .id
        .ok_or_else(|| CatalogError::Parse(format!("event {event_name:?} arg {name:?} missing `id`")))?;
    let id = parse_hex_u8(&id_str).ok_or_else(|| {
        CatalogError::Parse(format!(
            "event {event_name:?} arg {name:?} has invalid hex id {id_str:?}"
        ))
    })?;
    Ok(EventArg::new(name, type_name, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[events]]
        name = "server.ping"
        id = "0x0001"
        return_type = "string"

        [[events.args]]
        name = "server_name"
        type = "string"
        id = "0x01"

        [[events]]
        name = "players.joined"
        id = "0x0002"

        [[events.args]]
        name = "timestamp"
        type = "datetime"
        id = "0x01"

        [[events.args]]
        name = "player"
        type = "string"
        id = "0x02"
    "#;

    #[test]
    fn loads_and_looks_up() {
        let catalog = Catalog::load_from_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let ping = catalog.lookup_by_name("server.ping").unwrap();
        assert_eq!(ping.id, 1);
        assert_eq!(ping.args.len(), 1);
        let by_id = catalog.lookup_by_id(1).unwrap();
        assert_eq!(by_id, ping);
    }

    #[test]
    fn response_event_lookup_by_id_and_name() {
        let catalog = Catalog::load_from_str(SAMPLE).unwrap();
        let resp = catalog.lookup_by_id(0x10001).unwrap();
        assert_eq!(resp.name, "server.ping.RETURN");
        assert_eq!(resp.args[0].type_name, "string");

        let resp_by_name = catalog.lookup_by_name("server.ping.RETURN").unwrap();
        assert_eq!(resp_by_name, resp);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let toml = r#"
            [[events]]
            name = "a.one"
            id = "0x0001"

            [[events]]
            name = "a.two"
            id = "0x0001"
        "#;
        assert!(matches!(
            Catalog::load_from_str(toml),
            Err(CatalogError::DuplicateId(1, _, _))
        ));
    }

    #[test]
    fn rejects_zero_id() {
        let toml = r#"
            [[events]]
            name = "a.one"
            id = "0x0000"
        "#;
        assert!(matches!(Catalog::load_from_str(toml), Err(CatalogError::ZeroId(_))));
    }

    #[test]
    fn rejects_unsupported_arg_type() {
        let toml = r#"
            [[events]]
            name = "a.one"
            id = "0x0001"

            [[events.args]]
            name = "x"
            type = "frozenset[int]"
            id = "0x01"
        "#;
        assert!(matches!(
            Catalog::load_from_str(toml),
            Err(CatalogError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn unknown_lookups_fail() {
        let catalog = Catalog::load_from_str(SAMPLE).unwrap();
        assert!(catalog.lookup_by_id(0xBEEF).is_err());
        assert!(catalog.lookup_by_name("no.such.event").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes()).unwrap();
        let catalog = Catalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = Path::new("/nonexistent/catalog.toml");
        assert!(matches!(Catalog::load_from_file(path), Err(CatalogError::Io { .. })));
    }
}
