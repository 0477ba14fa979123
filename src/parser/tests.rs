//! Tests for the parser module

use super::*;
use crate::paging::PagingState;
use serde_json::{json, Value};

fn state(entity_type: &str, id: Option<&str>) -> PagingState<Value, String> {
    PagingState::new(entity_type, id.map(str::to_string))
}

fn items_of(response: &Value) -> Result<Vec<Value>> {
    Ok(response["items"].as_array().cloned().unwrap_or_default())
}

fn cursor_of(response: &Value) -> Result<Option<String>> {
    Ok(response["next"].as_str().map(str::to_string))
}

// ============================================================================
// ParsedBatch Tests
// ============================================================================

#[test]
fn test_parsed_batch_builder() {
    let parsed: ParsedBatch<Value, String> = ParsedBatch::new()
        .update(EntityKey::singleton("a"), vec![json!(1)], Some("c1".into()))
        .update(EntityKey::singleton("b"), Vec::new(), None)
        .spawn(PagingState::new("spawned", None));

    assert_eq!(parsed.updates.len(), 2);
    assert_eq!(parsed.spawned.len(), 1);

    let update = &parsed.updates[&EntityKey::singleton("a")];
    assert_eq!(update.items, vec![json!(1)]);
    assert_eq!(update.cursor.as_deref(), Some("c1"));
}

// ============================================================================
// SingleStateParser Tests
// ============================================================================

#[test]
fn test_single_state_parser_extracts_items_and_cursor() {
    let parser = SingleStateParser::new(items_of, cursor_of);
    let batch = vec![state("accounts", None)];

    let response = json!({"items": [1, 2], "next": "abc"});
    let parsed = parser.parse(&response, &batch).unwrap();

    let update = &parsed.updates[&EntityKey::singleton("accounts")];
    assert_eq!(update.items, vec![json!(1), json!(2)]);
    assert_eq!(update.cursor.as_deref(), Some("abc"));
    assert!(parsed.spawned.is_empty());
}

#[test]
fn test_single_state_parser_last_page() {
    let parser = SingleStateParser::new(items_of, cursor_of);
    let batch = vec![state("accounts", None)];

    let response = json!({"items": [3], "next": null});
    let parsed = parser.parse(&response, &batch).unwrap();

    let update = &parsed.updates[&EntityKey::singleton("accounts")];
    assert!(update.cursor.is_none());
}

#[test]
fn test_single_state_parser_rejects_larger_batches() {
    let parser = SingleStateParser::new(items_of, cursor_of);
    let batch = vec![state("a", Some("1")), state("a", Some("2"))];

    let err = parser.parse(&json!({}), &batch).unwrap_err();
    assert_eq!(err, Error::invalid_batch_size(2));
}

#[test]
fn test_single_state_parser_rejects_empty_batch() {
    let parser = SingleStateParser::new(items_of, cursor_of);
    let batch: Vec<PagingState<Value, String>> = Vec::new();

    let err = parser.parse(&json!({}), &batch).unwrap_err();
    assert_eq!(err, Error::invalid_batch_size(0));
}

#[test]
fn test_single_state_parser_spawns() {
    let parser = SingleStateParser::new(items_of, cursor_of).with_spawns(|response: &Value| {
        let names = response["accounts"].as_array().cloned().unwrap_or_default();
        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| PagingState::new("account_repos", Some(name.to_string())))
            .collect())
    });
    let batch = vec![state("accounts", None)];

    let response = json!({"items": [], "next": null, "accounts": ["alpha", "beta"]});
    let parsed = parser.parse(&response, &batch).unwrap();

    assert_eq!(parsed.spawned.len(), 2);
    assert_eq!(parsed.spawned[0].key(), EntityKey::new("account_repos", "alpha"));
    assert_eq!(parsed.spawned[1].key(), EntityKey::new("account_repos", "beta"));
}

#[test]
fn test_single_state_parser_extractor_error_propagates() {
    let parser: SingleStateParser<Value, Value, String> = SingleStateParser::new(
        |response: &Value| {
            response["items"]
                .as_array()
                .cloned()
                .ok_or_else(|| Error::parse("missing items field"))
        },
        cursor_of,
    );
    let batch = vec![state("accounts", None)];

    let err = parser.parse(&json!({"unexpected": true}), &batch).unwrap_err();
    assert!(err.is_parse_error());
}

// ============================================================================
// MultiStateParser Tests
// ============================================================================

#[test]
fn test_multi_state_parser_addresses_each_state() {
    let parser = MultiStateParser::new(|response: &Value| {
        let updates = response["results"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                StateUpdate::new(
                    "orders",
                    entry["id"].as_str().map(str::to_string),
                    entry["items"].as_array().cloned().unwrap_or_default(),
                    entry["next"].as_str().map(str::to_string),
                )
            })
            .collect();
        Ok(updates)
    });

    let batch = vec![state("orders", Some("1")), state("orders", Some("2"))];
    let response = json!({"results": [
        {"id": "1", "items": [10], "next": "p2"},
        {"id": "2", "items": [20, 21], "next": null}
    ]});

    let parsed = parser.parse(&response, &batch).unwrap();
    assert_eq!(parsed.updates.len(), 2);

    let first = &parsed.updates[&EntityKey::new("orders", "1")];
    assert_eq!(first.cursor.as_deref(), Some("p2"));
    let second = &parsed.updates[&EntityKey::new("orders", "2")];
    assert!(second.cursor.is_none());
    assert_eq!(second.items.len(), 2);
}

#[test]
fn test_multi_state_parser_unmentioned_state_gets_no_update() {
    let parser: MultiStateParser<Value, Value, String> =
        MultiStateParser::new(|_: &Value| Ok(Vec::new()));

    let batch = vec![state("orders", Some("1"))];
    let parsed = parser.parse(&json!({}), &batch).unwrap();

    // The scheduler treats a missing key as "no items, no further pages"
    assert!(parsed.updates.is_empty());
}

#[test]
fn test_multi_state_parser_spawns() {
    let parser = MultiStateParser::new(|_: &Value| Ok(Vec::new())).with_spawns(|_: &Value| {
        Ok(vec![PagingState::new("children", Some("c1".to_string()))])
    });

    let batch = vec![state("orders", Some("1"))];
    let parsed = parser.parse(&json!({}), &batch).unwrap();
    assert_eq!(parsed.spawned.len(), 1);
}
