//! [`Event`] and [`EventArg`]: the catalog's schema types, and
//! derivation of the synthetic response event for events that declare
//! a return type.

use bus_codec::is_supported_type;

use crate::error::CatalogError;

/// One declared argument of an [`Event`]. `id` is unique within the
/// enclosing event and is what appears in the wire arg block, not
/// `name` — names only matter for callback signature checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArg {
    pub name: String,
    /// Declared type designator, e.g. `"int"`, `"list[str]"`.
    pub type_name: String,
    pub id: u8,
}

impl EventArg {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, id: u8) -> Self {
        EventArg {
            name: name.into(),
            type_name: type_name.into(),
            id,
        }
    }
}

/// The "high bit" OR'd into an event id to address its synthetic
/// response event.
pub const RESPONSE_BIT: u32 = 0x10000;

/// `return_type` designator meaning "this event produces no reply".
pub const NO_RETURN: &str = "None";

/// A catalog event: dotted globally-unique `name`, catalog-unique
/// `id` (`<= 0xFFFF`), ordered `args`, and a `return_type`
/// (`"None"` for fire-and-forget events).
///
/// Response events (`id | RESPONSE_BIT`, name suffixed `.RETURN`) are
/// never constructed directly by catalog loading; they only come from
/// [`Event::response_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub id: u32,
    pub args: Vec<EventArg>,
    pub return_type: String,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        id: u32,
        args: Vec<EventArg>,
        return_type: impl Into<String>,
    ) -> Self {
        Event {
            name: name.into(),
            id,
            args,
            return_type: return_type.into(),
        }
    }

    pub fn is_response_event(&self) -> bool {
        self.id > 0xFFFF
    }

    pub fn has_return(&self) -> bool {
        self.return_type != NO_RETURN
    }

    /// Derives the synthetic response event for this event: same id
    /// with [`RESPONSE_BIT`] set, name suffixed `.RETURN`, a single
    /// `result` argument of this event's return type, and no return
    /// type of its own.
    ///
    /// Fails if this event is already a response event or has no
    /// return type to carry back.
    pub fn response_event(&self) -> Result<Event, CatalogError> {
        if self.is_response_event() {
            return Err(CatalogError::AlreadyResponseEvent(self.name.clone()));
        }
        if !self.has_return() {
            return Err(CatalogError::NoReturnType(self.name.clone()));
        }
        Ok(Event {
            name: format!("{}.RETURN", self.name),
            id: self.id | RESPONSE_BIT,
            args: vec![EventArg::new("result", self.return_type.clone(), 1)],
            return_type: NO_RETURN.to_string(),
        })
    }

    pub(crate) fn validate(&self) -> Result<(), CatalogError> {
        if self.id == 0 {
            return Err(CatalogError::ZeroId(self.name.clone()));
        }
        if self.id > 0xFFFF {
            return Err(CatalogError::IdOutOfRange(self.name.clone(), self.id));
        }
        let mut seen_arg_ids = std::collections::HashSet::new();
        for arg in &self.args {
            if !is_supported_type(&arg.type_name) {
                return Err(CatalogError::UnsupportedType {
                    event: self.name.clone(),
                    arg: arg.name.clone(),
                    type_name: arg.type_name.clone(),
                });
            }
            if !seen_arg_ids.insert(arg.id) {
                return Err(CatalogError::DuplicateArgId {
                    event: self.name.clone(),
                    arg_id: arg.id,
                });
            }
        }
        if self.return_type != NO_RETURN && !is_supported_type(&self.return_type) {
            return Err(CatalogError::UnsupportedType {
                event: self.name.clone(),
                arg: "<return>".to_string(),
                type_name: self.return_type.clone(),
            });
        }
        Ok(())
    }
}
