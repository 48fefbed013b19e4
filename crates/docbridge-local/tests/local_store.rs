//! Read and write tasks against a JSON-lines store in a temp directory.

use std::fs;

use docbridge::{
    AdapterSpec, InMemoryCounters, LifecycleState, RepositoryFactory, ScrollCursor, SinkTask,
    SourceTask, TaskLifecycle,
};
use docbridge_local::LocalFactory;
use docbridge_types::settings::keys;
use docbridge_types::{Counter, Fields, Settings, Tuple, Value};

fn write_people(factory: &LocalFactory, config: &Settings) -> InMemoryCounters {
    let fields = Fields::named(["name", "age", "city"]);
    let spec = AdapterSpec::new("people")
        .fields(fields.clone())
        .props(Settings::new().with(keys::MAPPING_NAMES, "name:user.name,age:user.age"));
    let mut sink = SinkTask::new(spec, factory.clone());
    sink.configure(config).unwrap();
    sink.open().unwrap();
    for (name, age, city) in [("ana", 30, "lisbon"), ("bo", 41, "oslo"), ("cy", 30, "rome")] {
        let tuple = Tuple::with_values(
            fields.clone(),
            vec![Value::from(name), Value::Long(age), Value::from(city)],
        )
        .unwrap();
        sink.write_one(&tuple).unwrap();
    }
    let counters = InMemoryCounters::new();
    sink.close(&counters).unwrap();
    counters
}

fn read_people(factory: &LocalFactory, spec: AdapterSpec, config: &Settings) -> Vec<Vec<Value>> {
    let fields = spec.fields.clone();
    let mut source = SourceTask::new(spec, factory.clone());
    source.configure(config).unwrap();
    source.open().unwrap();
    let mut tuple = Tuple::new(fields);
    let mut rows = Vec::new();
    while source.read_next(&mut tuple).unwrap() {
        rows.push(tuple.values().to_vec());
    }
    source.close(&InMemoryCounters::new()).unwrap();
    rows
}

#[test]
fn written_documents_are_nested_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    let counters = write_people(&factory, &Settings::new());

    let content = fs::read_to_string(dir.path().join("people.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        serde_json::json!({"user": {"name": "ana", "age": 30}, "city": "lisbon"})
    );

    assert_eq!(counters.get(Counter::DocsWritten), 3);
    assert_eq!(counters.get(Counter::BulkWrites), 1);
    assert_eq!(counters.get(Counter::BytesWritten), content.len() as u64);
}

#[test]
fn small_batches_flush_as_separate_bulks() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    let config = Settings::new().with(keys::BATCH_SIZE_ENTRIES, "2");
    let counters = write_people(&factory, &config);
    assert_eq!(counters.get(Counter::BulkWrites), 2);
    assert_eq!(counters.get(Counter::DocsWritten), 3);
}

#[test]
fn read_back_through_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    write_people(&factory, &Settings::new());

    let spec = AdapterSpec::new("people")
        .fields(Fields::named(["name", "city", "missing"]))
        .props(Settings::new().with(keys::MAPPING_NAMES, "name:user.name"));
    let rows = read_people(&factory, spec, &Settings::new());
    assert_eq!(
        rows,
        vec![
            vec![Value::from("ana"), Value::from("lisbon"), Value::Null],
            vec![Value::from("bo"), Value::from("oslo"), Value::Null],
            vec![Value::from("cy"), Value::from("rome"), Value::Null],
        ]
    );
}

#[test]
fn term_query_filters_documents() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    write_people(&factory, &Settings::new());

    let spec = AdapterSpec::new("people")
        .query("?q=user.age:30")
        .fields(Fields::named(["city"]));
    let rows = read_people(&factory, spec, &Settings::new());
    assert_eq!(rows, vec![vec![Value::from("lisbon")], vec![Value::from("rome")]]);
}

#[test]
fn legacy_round_trip_uses_flat_keys() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    let legacy = Settings::new().with(keys::INTERNAL_VERSION, "0.20.6");
    write_people(&factory, &legacy);

    let content = fs::read_to_string(dir.path().join("people.jsonl")).unwrap();
    let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["user.name"], "ana");

    let spec = AdapterSpec::new("people")
        .query("user.name:bo")
        .fields(Fields::named(["name", "age"]))
        .props(Settings::new().with(keys::MAPPING_NAMES, "name:user.name,age:user.age"));
    let rows = read_people(&factory, spec, &legacy);
    assert_eq!(rows, vec![vec![Value::from("bo"), Value::Long(41)]]);
}

#[test]
fn read_counters_reach_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path());
    write_people(&factory, &Settings::new());
    let size = fs::metadata(dir.path().join("people.jsonl")).unwrap().len();

    let mut source = SourceTask::new(AdapterSpec::new("people"), factory);
    source.configure(&Settings::new()).unwrap();
    source.open().unwrap();
    let mut tuple = Tuple::undeclared();
    while source.read_next(&mut tuple).unwrap() {}

    let counters = InMemoryCounters::new();
    source.close(&counters).unwrap();
    assert_eq!(counters.get(Counter::DocsRead), 3);
    assert_eq!(counters.get(Counter::BytesRead), size);
    assert_eq!(counters.get(Counter::NetRetries), 0);
}

#[test]
fn sink_creates_missing_resource_only_with_auto_create() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LocalFactory::new(dir.path().join("nested"));
    let spec = AdapterSpec::new("events").fields(Fields::named(["id"]));

    let mut strict = SinkTask::new(spec.clone(), factory.clone());
    strict
        .configure(&Settings::new().with(keys::INDEX_AUTO_CREATE, "false"))
        .unwrap();
    assert_eq!(strict.open().unwrap_err().code, "RESOURCE_MISSING");
    assert_eq!(strict.state(), LifecycleState::Configured);
    assert!(!dir.path().join("nested/events.jsonl").exists());

    let mut lenient = SinkTask::new(spec, factory);
    lenient.configure(&Settings::new()).unwrap();
    lenient.open().unwrap();
    assert!(dir.path().join("nested/events.jsonl").exists());
    lenient.close(&InMemoryCounters::new()).unwrap();

    strict.open().unwrap();
    strict.close(&InMemoryCounters::new()).unwrap();
}

#[test]
fn scrolling_a_missing_resource_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = SourceTask::new(AdapterSpec::new("ghost"), LocalFactory::new(dir.path()));
    source.configure(&Settings::new()).unwrap();
    let err = source.open().unwrap_err();
    assert_eq!(err.code, "RESOURCE_MISSING");
    assert!(err.is_fatal_config());
    source.close(&InMemoryCounters::new()).unwrap();
}

#[test]
fn corrupt_line_is_a_data_error_with_line_number() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.jsonl"), "{\"a\":1}\n\nnot json\n").unwrap();
    let factory = LocalFactory::new(dir.path());
    let settings = Settings::new().with(keys::RESOURCE, "bad");
    let mut cursor = factory.scroll(&settings).unwrap();

    let first = cursor.next_hit().unwrap().unwrap();
    assert_eq!(first.id, "bad:1");
    let err = cursor.next_hit().unwrap_err();
    assert_eq!(err.code, "INVALID_DOCUMENT");
    assert_eq!(err.details.unwrap()["line"], 3);
}

#[test]
fn resource_names_cannot_escape_root() {
    let factory = LocalFactory::new("/tmp/store");
    for bad in ["../etc", "a/b", ".hidden", ""] {
        assert_eq!(
            factory.resource_path(bad).unwrap_err().code,
            "INVALID_RESOURCE",
            "{bad}"
        );
    }
}
