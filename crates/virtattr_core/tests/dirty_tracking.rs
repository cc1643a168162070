use rusqlite::Connection;
use std::sync::Arc;
use virtattr_core::db::open_db_in_memory;
use virtattr_core::{
    AttributeOptions, AttributeType, Record, RecordRepository, Schema, SchemaRegistry,
    SqliteRecordRepository, Value,
};

fn item_schema() -> Arc<Schema> {
    Schema::builder("Item")
        .column("name")
        .has_attribute(
            "greeting",
            AttributeType::String,
            AttributeOptions::default().with_default("Hello"),
        )
        .has_attribute(
            "counter",
            AttributeType::Integer,
            AttributeOptions::default().in_field("meta_data").with_default(0),
        )
        .build()
        .unwrap()
}

fn repo<'c>(conn: &'c Connection, schema: &Arc<Schema>) -> SqliteRecordRepository<'c> {
    SqliteRecordRepository::try_new(conn, SchemaRegistry::new().register(schema)).unwrap()
}

#[test]
fn changed_then_saved_change_for_virtual_attribute() {
    let conn = open_db_in_memory().unwrap();
    let schema = item_schema();
    let repo = repo(&conn, &schema);

    let mut item = Record::new(&schema);
    item.assign_all([("name", Value::from("Chandra")), ("greeting", Value::from("Hi"))])
        .unwrap();
    repo.save(&mut item).unwrap();
    assert!(!item.has_changes());

    item.write_attribute("greeting", "Hey there").unwrap();
    assert!(item.attribute_changed("greeting"));
    assert!(!item.attribute_changed("counter"));
    assert_eq!(
        item.changes().get("greeting"),
        Some(&(Value::from("Hi"), Value::from("Hey there")))
    );

    repo.save(&mut item).unwrap();
    assert!(!item.attribute_changed("greeting"));
    assert!(item.saved_change_to_attribute("greeting"));
    assert_eq!(
        item.previous_changes().get("greeting"),
        Some(&(Value::from("Hi"), Value::from("Hey there")))
    );
}

#[test]
fn virtual_attributes_and_columns_share_change_tracking() {
    let conn = open_db_in_memory().unwrap();
    let schema = item_schema();
    let repo = repo(&conn, &schema);

    let mut item = Record::new(&schema);
    repo.save(&mut item).unwrap();

    item.set_column("name", "Dana").unwrap();
    item.write_attribute("counter", 3).unwrap();
    assert_eq!(
        item.changed_attributes(),
        vec!["counter".to_string(), "name".to_string()]
    );

    repo.save(&mut item).unwrap();
    assert!(item.saved_change_to_attribute("name"));
    assert!(item.saved_change_to_attribute("counter"));
    assert!(!item.saved_change_to_attribute("greeting"));
}

#[test]
fn write_marks_changed_even_when_value_is_unchanged() {
    let schema = item_schema();
    let mut item = Record::new(&schema);

    item.write_attribute("greeting", "Hello").unwrap();
    assert!(item.attribute_changed("greeting"));
}

#[test]
fn mark_changed_forces_attribute_into_change_set() {
    let schema = item_schema();
    let mut item = Record::new(&schema);

    item.mark_changed("counter").unwrap();
    assert!(item.attribute_changed("counter"));
    assert!(item.mark_changed("unknown").is_err());
}

#[test]
fn loaded_records_start_clean() {
    let conn = open_db_in_memory().unwrap();
    let schema = item_schema();
    let repo = repo(&conn, &schema);

    let mut item = Record::new(&schema);
    item.write_attribute("greeting", "Hi").unwrap();
    let id = repo.save(&mut item).unwrap();

    let loaded = repo.find(id).unwrap().expect("saved item should load");
    assert!(!loaded.has_changes());
    assert!(!loaded.saved_change_to_attribute("greeting"));
}
