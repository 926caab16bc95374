//! Wire normalization
//!
//! Entities use camelCase field names; the remote store uses snake_case
//! columns. Four fields hold nested structures that the store keeps as JSON
//! text inside a versioned envelope:
//!
//! ```text
//! tasks          -> {"v":1,"data":[{"id":"..","text":"..","completed":false}]}
//! selected_menus -> {"v":1,"data":[{"menuId":3,"quantity":10,"unitPrice":20.0}]}
//! tags           -> {"v":1,"data":["vip","terraza"]}
//! items          -> {"v":1,"data":[<OrderItem>, ...]}
//! ```
//!
//! Rows written by older terminals carry the bare value (no envelope), either
//! as JSON text or as a native JSON array. Both are accepted. Anything that
//! does not match the schema for its field decodes to the empty default and
//! is logged.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use shared::models::{EventTask, SelectedMenu};
use shared::order::OrderItem;
use std::collections::BTreeSet;

use crate::store::Row;
use crate::{ClientError, ClientResult};

/// Current envelope version
pub const ENVELOPE_VERSION: u64 = 1;

/// Nested structures stored as JSON text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStructure {
    Tasks,
    SelectedMenus,
    Tags,
    Items,
}

impl SubStructure {
    /// Identify a sub-structure column by its wire name
    pub fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "tasks" => Some(Self::Tasks),
            "selected_menus" => Some(Self::SelectedMenus),
            "tags" => Some(Self::Tags),
            "items" => Some(Self::Items),
            _ => None,
        }
    }

    pub fn wire_key(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::SelectedMenus => "selected_menus",
            Self::Tags => "tags",
            Self::Items => "items",
        }
    }

    /// Check the decoded payload against this field's schema
    fn accepts(&self, data: &Value) -> bool {
        match self {
            Self::Tasks => fits::<Vec<EventTask>>(data),
            Self::SelectedMenus => fits::<Vec<SelectedMenu>>(data),
            Self::Tags => fits::<BTreeSet<String>>(data),
            Self::Items => fits::<Vec<OrderItem>>(data),
        }
    }

    /// Flat records written by older terminals may use snake_case keys
    fn normalizes_inner_keys(&self) -> bool {
        matches!(self, Self::Tasks | Self::SelectedMenus)
    }
}

fn fits<T: DeserializeOwned>(data: &Value) -> bool {
    serde_json::from_value::<T>(data.clone()).is_ok()
}

// ========== Key mapping ==========

/// `isVenueOnly` → `is_venue_only`
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `is_venue_only` → `isVenueOnly`
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ========== Encoding ==========

/// Convert a camelCase entity (or patch) object into a wire row
pub fn encode_object(object: &Map<String, Value>) -> Row {
    object
        .iter()
        .map(|(key, value)| {
            let wire_key = camel_to_snake(key);
            let wire_value = match SubStructure::from_wire_key(&wire_key) {
                Some(_) => encode_envelope(value),
                None => value.clone(),
            };
            (wire_key, wire_value)
        })
        .collect()
}

/// Serialize an entity and convert it into a wire row
pub fn to_row<T: Serialize>(entity: &T) -> ClientResult<Row> {
    match serde_json::to_value(entity)? {
        Value::Object(object) => Ok(encode_object(&object)),
        other => Err(ClientError::Validation(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

fn encode_envelope(data: &Value) -> Value {
    Value::String(json!({ "v": ENVELOPE_VERSION, "data": data }).to_string())
}

// ========== Decoding ==========

/// Convert a wire row into a camelCase object
///
/// Null columns are dropped so entity defaults apply.
pub fn decode_row(row: Row) -> Map<String, Value> {
    let mut out = Map::with_capacity(row.len());
    for (key, value) in row {
        if value.is_null() {
            continue;
        }
        let value = match SubStructure::from_wire_key(&key) {
            Some(sub) => decode_sub_structure(sub, value),
            None => value,
        };
        out.insert(snake_to_camel(&key), value);
    }
    out
}

/// Decode a wire row into an entity
pub fn from_row<T: DeserializeOwned>(row: Row) -> ClientResult<T> {
    let object = decode_row(row);
    serde_json::from_value(Value::Object(object)).map_err(Into::into)
}

/// Decode one sub-structure column; fails closed to an empty array
pub fn decode_sub_structure(sub: SubStructure, raw: Value) -> Value {
    let parsed = match raw {
        Value::String(text) => {
            if text.trim().is_empty() {
                return empty();
            }
            match serde_json::from_str::<Value>(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(field = sub.wire_key(), error = %e, "Unparseable sub-structure, using default");
                    return empty();
                }
            }
        }
        other => other,
    };

    let data = match parsed {
        Value::Object(mut envelope) if envelope.contains_key("v") => {
            match envelope.get("v").and_then(Value::as_u64) {
                Some(ENVELOPE_VERSION) => envelope.remove("data").unwrap_or(Value::Null),
                other => {
                    tracing::warn!(field = sub.wire_key(), version = ?other, "Unsupported sub-structure version, using default");
                    return empty();
                }
            }
        }
        // legacy: bare value
        bare => bare,
    };

    if data.is_null() {
        return empty();
    }

    let data = if sub.normalizes_inner_keys() {
        camelize_records(data)
    } else {
        data
    };

    if sub.accepts(&data) {
        data
    } else {
        tracing::warn!(field = sub.wire_key(), "Sub-structure does not match schema, using default");
        empty()
    }
}

fn camelize_records(data: Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(
                        map.into_iter()
                            .map(|(k, v)| (snake_to_camel(&k), v))
                            .collect(),
                    ),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn empty() -> Value {
    Value::Array(Vec::new())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::models::{
        DepositStatus, DiningTable, EventBudget, EventMenu, EventStatus, Reservation,
        ReservationStatus, VenueInfo,
    };
    use shared::order::{ItemStatus, KitchenTicket, ProductRef};
    use shared::types::EntityId;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn sample_event() -> EventBudget {
        EventBudget {
            id: EntityId::from(4),
            name: "Boda Ruiz".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            guests: 120,
            is_venue_only: false,
            venue_price: 0.0,
            selected_menus: vec![SelectedMenu {
                menu_id: EntityId::from(2),
                quantity: 120,
                unit_price: 45.0,
            }],
            tax_rate: 0.10,
            has_vat: true,
            total: 5940.0,
            status: EventStatus::Confirmed,
            deposit_amount: 1000.0,
            deposit_status: DepositStatus::Paid,
            tasks: vec![EventTask {
                id: "t1".to_string(),
                text: "Confirmar flores".to_string(),
                completed: false,
            }],
            client_nif: "B12345678".to_string(),
            client_address: "Calle Mayor 1".to_string(),
            invoice_number: Some(17),
            created_at: None,
        }
    }

    fn sample_reservation() -> Reservation {
        Reservation {
            id: EntityId::from(9),
            customer_name: "Marta".to_string(),
            phone: "600000000".to_string(),
            people: 4,
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            time: "21:30".to_string(),
            table_id: Some(EntityId::from(3)),
            notes: Some("cumpleaños".to_string()),
            status: ReservationStatus::Seated,
            tags: ["vip".to_string()].into_iter().collect(),
            created_at: None,
        }
    }

    #[test]
    fn test_key_mapping() {
        let pairs = [
            ("customerName", "customer_name"),
            ("tableId", "table_id"),
            ("isVenueOnly", "is_venue_only"),
            ("venuePrice", "venue_price"),
            ("selectedMenus", "selected_menus"),
            ("taxRate", "tax_rate"),
            ("hasVat", "has_vat"),
            ("depositAmount", "deposit_amount"),
            ("depositStatus", "deposit_status"),
            ("clientNif", "client_nif"),
            ("clientAddress", "client_address"),
            ("invoiceNumber", "invoice_number"),
            ("createdAt", "created_at"),
            ("pricePerPerson", "price_per_person"),
            ("isManuallyReserved", "is_manually_reserved"),
            ("tableName", "table_name"),
            ("terminalId", "terminal_id"),
            ("id", "id"),
            ("people", "people"),
        ];
        for (camel, snake) in pairs {
            assert_eq!(camel_to_snake(camel), snake, "camel → snake for {}", camel);
            assert_eq!(snake_to_camel(snake), camel, "snake → camel for {}", snake);
        }
    }

    #[test]
    fn test_every_entity_field_round_trips_through_key_mapping() {
        let product = ProductRef {
            id: EntityId::from(1),
            name: "Caña".to_string(),
            price: 2.5,
        };
        let ticket = KitchenTicket {
            id: EntityId::from(1),
            table_id: EntityId::from(2),
            table_name: "T2".to_string(),
            items: vec![OrderItem::from_product(&product, Default::default())],
            created_at: chrono::Utc::now(),
            status: Default::default(),
            terminal_id: Some("bar".to_string()),
        };
        let samples = vec![
            serde_json::to_value(sample_event()).unwrap(),
            serde_json::to_value(sample_reservation()).unwrap(),
            serde_json::to_value(&ticket).unwrap(),
            serde_json::to_value(EventMenu {
                id: EntityId::from(1),
                name: "Menú degustación".to_string(),
                price_per_person: 55.0,
                description: Some("7 pases".to_string()),
                active: true,
            })
            .unwrap(),
            serde_json::to_value(VenueInfo::default()).unwrap(),
            serde_json::to_value(DiningTable {
                id: EntityId::from(1),
                name: "T1".to_string(),
                zone: "Sala".to_string(),
                is_manually_reserved: true,
            })
            .unwrap(),
        ];
        for sample in samples {
            let object = sample.as_object().unwrap();
            for key in object.keys() {
                let wire = camel_to_snake(key);
                assert!(!wire.chars().any(|c| c.is_ascii_uppercase()), "{}", wire);
                assert_eq!(&snake_to_camel(&wire), key);
            }
        }
    }

    #[test]
    fn test_event_round_trip() {
        let event = sample_event();
        let wire = to_row(&event).unwrap();

        assert!(wire.contains_key("client_nif"));
        assert!(wire.contains_key("is_venue_only"));
        let tasks = wire["tasks"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(tasks).unwrap();
        assert_eq!(envelope["v"], 1);
        assert_eq!(envelope["data"][0]["text"], "Confirmar flores");

        let decoded: EventBudget = from_row(wire).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_reservation_round_trip() {
        let reservation = sample_reservation();
        let decoded: Reservation = from_row(to_row(&reservation).unwrap()).unwrap();
        assert_eq!(decoded, reservation);
    }

    #[test]
    fn test_remote_row_with_numeric_and_null_columns() {
        let wire = row(json!({
            "id": 12,
            "customer_name": "Luis",
            "phone": null,
            "people": 2,
            "date": "2026-10-16",
            "time": "14:00",
            "table_id": "07",
            "notes": null,
            "status": "CONFIRMED",
            "tags": null,
            "created_at": "2026-10-01T10:00:00+00:00"
        }));
        let reservation: Reservation = from_row(wire).unwrap();
        assert_eq!(reservation.id, EntityId::from(12));
        assert_eq!(reservation.table_id, Some(EntityId::from(7)));
        assert_eq!(reservation.phone, "");
        assert!(reservation.notes.is_none());
        assert!(reservation.tags.is_empty());
        assert!(reservation.created_at.is_some());
    }

    #[test]
    fn test_legacy_bare_json_text() {
        let value = decode_sub_structure(
            SubStructure::Tags,
            Value::String(r#"["vip","terraza"]"#.to_string()),
        );
        assert_eq!(value, json!(["vip", "terraza"]));
    }

    #[test]
    fn test_legacy_native_array() {
        let value = decode_sub_structure(
            SubStructure::SelectedMenus,
            json!([{ "menuId": 1, "quantity": 10, "unitPrice": 20.0 }]),
        );
        assert_eq!(value[0]["quantity"], 10);
    }

    #[test]
    fn test_legacy_snake_case_records() {
        let value = decode_sub_structure(
            SubStructure::SelectedMenus,
            Value::String(r#"[{"menu_id":"3","quantity":2,"unit_price":12.5}]"#.to_string()),
        );
        let menus: Vec<SelectedMenu> = serde_json::from_value(value).unwrap();
        assert_eq!(menus[0].menu_id, EntityId::from(3));
        assert_eq!(menus[0].unit_price, 12.5);
    }

    #[test]
    fn test_envelope_in_native_json() {
        let value = decode_sub_structure(
            SubStructure::Tasks,
            json!({ "v": 1, "data": [{ "id": "a", "text": "Llamar", "completed": true }] }),
        );
        assert_eq!(value[0]["completed"], true);
    }

    #[test]
    fn test_garbage_text_fails_closed() {
        let value = decode_sub_structure(SubStructure::Tasks, Value::String("{not json".into()));
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_unsupported_version_fails_closed() {
        let value = decode_sub_structure(
            SubStructure::Tags,
            Value::String(r#"{"v":2,"data":["vip"]}"#.to_string()),
        );
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_schema_mismatch_fails_closed() {
        // tasks without text
        let value = decode_sub_structure(SubStructure::Tasks, json!([{ "id": "a" }]));
        assert_eq!(value, json!([]));

        // scalar where a list is expected
        let value = decode_sub_structure(SubStructure::Items, json!(42));
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_empty_text_and_null_data() {
        assert_eq!(
            decode_sub_structure(SubStructure::Tags, Value::String("  ".into())),
            json!([])
        );
        assert_eq!(
            decode_sub_structure(SubStructure::Tags, json!({ "v": 1, "data": null })),
            json!([])
        );
    }

    #[test]
    fn test_corrupt_sub_structure_keeps_rest_of_row() {
        let mut wire = to_row(&sample_event()).unwrap();
        wire.insert("selected_menus".into(), Value::String("[[[".into()));
        let decoded: EventBudget = from_row(wire).unwrap();
        assert!(decoded.selected_menus.is_empty());
        assert_eq!(decoded.tasks.len(), 1);
        assert_eq!(decoded.name, "Boda Ruiz");
    }

    #[test]
    fn test_ticket_items_keep_modifier_keys() {
        let product = ProductRef {
            id: EntityId::from(5),
            name: "Entrecot".to_string(),
            price: 24.0,
        };
        let mut mods = shared::order::Modifiers::new();
        mods.insert("punto_carne".to_string(), "al punto".to_string());
        let mut item = OrderItem::from_product(&product, mods);
        item.item_status = ItemStatus::Sent;

        let encoded = encode_object(&row(json!({ "items": [item.clone()] })));
        let decoded = decode_row(encoded);
        let items: Vec<OrderItem> = serde_json::from_value(decoded["items"].clone()).unwrap();
        assert_eq!(items, vec![item]);
    }

    #[test]
    fn test_encode_patch_only_touches_given_keys() {
        let patch = row(json!({ "people": 6, "tags": ["vip"] }));
        let wire = encode_object(&patch);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire["people"], 6);
        assert!(wire["tags"].is_string());
    }

    #[test]
    fn test_to_row_rejects_non_objects() {
        assert!(matches!(to_row(&42), Err(ClientError::Validation(_))));
    }
}
