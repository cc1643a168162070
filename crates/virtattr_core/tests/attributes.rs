use std::sync::Arc;
use virtattr_core::{AttributeError, AttributeOptions, AttributeType, Record, Schema, Value};

fn item_schema(field: &str) -> Arc<Schema> {
    let options = || AttributeOptions::default().in_field(field);
    Schema::builder("Item")
        .column("name")
        .has_attribute(
            "greeting",
            AttributeType::String,
            options().with_default("Hello"),
        )
        .has_attribute("counter", AttributeType::Integer, options().with_default(0))
        .has_attribute(
            "friendly",
            AttributeType::Boolean,
            options().with_default(true),
        )
        .build()
        .unwrap()
}

fn new_item(field: &str, assignments: &[(&str, Value)]) -> Record {
    let mut item = Record::new(&item_schema(field));
    item.assign_all(assignments.iter().cloned()).unwrap();
    item
}

#[test]
fn unset_attributes_read_their_defaults() {
    for field in ["data", "meta_data"] {
        let item = new_item(field, &[("name", Value::from("Alice"))]);

        assert_eq!(item.read_attribute("greeting").unwrap(), Value::from("Hello"));
        assert_eq!(item.read_attribute("counter").unwrap(), Value::from(0));
        assert_eq!(item.query_attribute("friendly").unwrap(), Some(true));
    }
}

#[test]
fn assigned_attributes_read_back_coerced() {
    for field in ["data", "meta_data"] {
        let item = new_item(
            field,
            &[
                ("name", Value::from("Bob")),
                ("greeting", Value::from("Heyup")),
                ("counter", Value::from("999")),
            ],
        );

        assert_eq!(item.read_attribute("greeting").unwrap(), Value::from("Heyup"));
        assert_eq!(item.read_attribute("counter").unwrap(), Value::Integer(999));
        assert_eq!(item.column("name"), Some(&Value::from("Bob")));
    }
}

#[test]
fn values_live_in_the_declared_backing_field() {
    let item = new_item("meta_data", &[("greeting", Value::from("Hi"))]);

    let meta = item.container("meta_data").expect("meta_data container");
    assert_eq!(meta.get("greeting"), Some(&Value::from("Hi")));
    assert!(item.container("data").is_none());
}

#[test]
fn boolean_predicate_follows_form_values() {
    for field in ["data", "meta_data"] {
        let mut item = new_item(field, &[("friendly", Value::from(false))]);
        assert_eq!(item.query_attribute("friendly").unwrap(), Some(false));

        item.write_attribute("friendly", "0").unwrap();
        assert_eq!(item.query_attribute("friendly").unwrap(), Some(false));

        item.write_attribute("friendly", "1").unwrap();
        assert_eq!(item.query_attribute("friendly").unwrap(), Some(true));

        item.write_attribute("friendly", true).unwrap();
        assert_eq!(item.read_attribute("friendly").unwrap(), Value::Bool(true));
    }
}

#[test]
fn boolean_without_a_boolean_value_reads_the_default() {
    let mut item = new_item("data", &[]);

    item.write_attribute("friendly", "").unwrap();
    assert_eq!(item.query_attribute("friendly").unwrap(), Some(true));

    item.write_attribute("friendly", Value::Null).unwrap();
    assert_eq!(item.query_attribute("friendly").unwrap(), Some(true));
}

#[test]
fn boolean_without_default_reads_none_when_unset() {
    let schema = Schema::builder("Flag")
        .has_attribute("enabled", AttributeType::Boolean, AttributeOptions::default())
        .build()
        .unwrap();
    let mut flag = Record::new(&schema);

    assert_eq!(flag.query_attribute("enabled").unwrap(), None);
    flag.write_attribute("enabled", "off").unwrap();
    assert_eq!(flag.query_attribute("enabled").unwrap(), Some(false));
}

#[test]
fn blank_but_set_values_read_back_as_the_default() {
    let schema = Schema::builder("Item")
        .has_attribute(
            "counter",
            AttributeType::Integer,
            AttributeOptions::default().with_default(10),
        )
        .has_attribute(
            "greeting",
            AttributeType::String,
            AttributeOptions::default().with_default("Hello"),
        )
        .build()
        .unwrap();
    let mut item = Record::new(&schema);

    item.write_attribute("counter", 0).unwrap();
    item.write_attribute("greeting", "").unwrap();

    assert_eq!(item.read_attribute("counter").unwrap(), Value::Integer(10));
    assert_eq!(item.read_attribute("greeting").unwrap(), Value::from("Hello"));
    let data = item.container("data").expect("data container");
    assert_eq!(data.get("counter"), Some(&Value::Integer(0)));
    assert_eq!(data.get("greeting"), Some(&Value::from("")));
}

#[test]
fn unparsable_input_degrades_instead_of_failing() {
    let schema = Schema::builder("Measurement")
        .has_attribute("count", AttributeType::Integer, AttributeOptions::default())
        .has_attribute(
            "ratio",
            AttributeType::Float,
            AttributeOptions::default().with_default(1.5),
        )
        .has_attribute("taken_on", AttributeType::Date, AttributeOptions::default())
        .build()
        .unwrap();
    let mut measurement = Record::new(&schema);

    measurement.write_attribute("count", "lots").unwrap();
    measurement.write_attribute("ratio", "n/a").unwrap();
    measurement.write_attribute("taken_on", "someday").unwrap();

    assert_eq!(measurement.read_attribute("count").unwrap(), Value::Null);
    assert_eq!(measurement.read_attribute("ratio").unwrap(), Value::Float(1.5));
    assert_eq!(measurement.read_attribute("taken_on").unwrap(), Value::Null);

    measurement.write_attribute("taken_on", "2024-05-06").unwrap();
    assert_eq!(
        measurement.read_attribute("taken_on").unwrap().as_date(),
        chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
    );
}

#[test]
fn redeclared_attribute_uses_latest_declaration() {
    let schema = Schema::builder("Item")
        .has_attribute(
            "greeting",
            AttributeType::String,
            AttributeOptions::default().with_default("Hello"),
        )
        .has_attribute(
            "greeting",
            AttributeType::String,
            AttributeOptions::default()
                .in_field("meta_data")
                .with_default("Howdy"),
        )
        .build()
        .unwrap();
    let mut item = Record::new(&schema);

    assert_eq!(item.read_attribute("greeting").unwrap(), Value::from("Howdy"));
    item.write_attribute("greeting", "Yo").unwrap();
    assert!(item.container("data").is_none());
    assert_eq!(
        item.container("meta_data").and_then(|meta| meta.get("greeting")),
        Some(&Value::from("Yo"))
    );
}

#[test]
fn undeclared_attribute_is_an_error() {
    let item = new_item("data", &[]);
    let err = item.read_attribute("farewell").unwrap_err();
    assert_eq!(
        err,
        AttributeError::UnknownAttribute {
            model: "Item".to_string(),
            name: "farewell".to_string(),
        }
    );
}
