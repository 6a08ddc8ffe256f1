use serde_json::{Value, json};
use std::fs;
use streamline::engine::{FileReader, FileWriter, Registry};
use streamline::{Opts, PipelineContext, stream_values_with};

fn times_eight_registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_handler("times8", |v: Value| -> anyhow::Result<Value> {
        let n = v
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("not a number: {v}"))?;
        Ok(json!({"new": n * 8}))
    });
    registry
}

const SCOPED_CHAIN: [&str; 8] = [
    "json",
    "history:push",
    "extract{selector=number}",
    "times8",
    "extract{selector=new}",
    "history:pop",
    "combine{path=result,source=-1,target=-2}",
    "extract{selector=result}",
];

// --- scoped sub-chain ---

#[test]
fn test_scoped_multiply_chain() {
    let inputs = vec![
        json!(r#"{"number":1}"#),
        json!(r#"{"number":2}"#),
        json!(r#"{"number":3}"#),
    ];
    let opts = Opts {
        workers: 1,
        ..Opts::default()
    };
    let out = stream_values_with(&times_eight_registry(), inputs, &SCOPED_CHAIN, &opts).unwrap();
    assert_eq!(out, vec![json!(8), json!(16), json!(24)]);
}

#[test]
fn test_scoped_chain_keeps_rest_of_item() {
    let opts = Opts {
        workers: 1,
        ..Opts::default()
    };
    let out = stream_values_with(
        &times_eight_registry(),
        vec![json!(r#"{"number":2,"name":"two"}"#)],
        &SCOPED_CHAIN[..7],
        &opts,
    )
    .unwrap();
    assert_eq!(out, vec![json!({"number": 2, "name": "two", "result": 16})]);
}

#[test]
fn test_scoped_chain_failure_travels_with_entry() {
    let opts = Opts {
        workers: 3,
        error_value: json!("ERR"),
        ..Opts::default()
    };
    let inputs = vec![json!(r#"{"number":1}"#), json!(r#"{"number":"x"}"#)];
    let mut out = stream_values_with(
        &times_eight_registry(),
        inputs,
        &["json", "n=times8(number, new)", "extract{selector=n}"],
        &opts,
    )
    .unwrap();
    out.sort_by_key(|v| v.to_string());
    // The failed item keeps flowing: its error value has no `new` key, so the merged result is null.
    assert_eq!(out, vec![json!(8), Value::Null]);
}

// --- file io ---

#[test]
fn test_file_reader_writer_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "{\"a\":1}\n{\"a\":2}\n").unwrap();

    let registry = Registry::with_builtins();
    let pipeline = registry
        .build_pipeline(
            &["json", "extract{selector=a}"],
            PipelineContext::new(2).unwrap(),
        )
        .unwrap();
    let mut reader = FileReader::new(input.to_str().unwrap(), Value::Null);
    let mut writer = FileWriter::new(output.to_str().unwrap());
    let count = pipeline.run(&mut reader, Some(&mut writer)).unwrap();

    assert_eq!(count, 2);
    assert_eq!(fs::read_to_string(&output).unwrap(), "1\n2");
}

#[test]
fn test_closing_and_trailing_newline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "a\r\nb\n").unwrap();

    let registry = Registry::with_builtins();
    let pipeline = registry
        .build_pipeline(&["headers{indexes}"], PipelineContext::new(1).unwrap())
        .unwrap();
    let mut reader =
        FileReader::new(input.to_str().unwrap(), Value::Null).keep_trailing_newline(true);
    let mut writer = FileWriter::new(output.to_str().unwrap()).closing_newline(true);
    let count = pipeline.run(&mut reader, Some(&mut writer)).unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "[0] a: a\n[1] b: b\n[2] : \n"
    );
}

#[test]
fn test_writer_per_input_template() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "alpha\nbeta").unwrap();
    let template = dir.path().join("{input}.out");

    let registry = Registry::with_builtins();
    let pipeline = registry
        .build_pipeline(
            &["split{delimiter=l}", "head{count=1}"],
            PipelineContext::new(1).unwrap(),
        )
        .unwrap();
    let mut reader = FileReader::new(input.to_str().unwrap(), Value::Null);
    let mut writer = FileWriter::new(template.to_str().unwrap());
    pipeline.run(&mut reader, Some(&mut writer)).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("alpha.out")).unwrap(), "a");
    assert!(!dir.path().join("beta.out").exists());
}

#[test]
fn test_read_file_stage() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("note.txt"), "hello").unwrap();
    let token = format!("readfile{{path={},file_metadata}}", dir.path().display());

    let out = stream_values_with(
        &Registry::with_builtins(),
        vec![json!("note.txt"), json!("missing.txt")],
        &[token.as_str()],
        &Opts {
            workers: 1,
            ..Opts::default()
        },
    )
    .unwrap();
    assert_eq!(out[0]["content"], json!("hello"));
    assert_eq!(out[0]["size"], json!(5));
    assert_eq!(out[1], Value::Null);
}

#[test]
fn test_missing_input_file_is_error() {
    let registry = Registry::with_builtins();
    let pipeline = registry
        .build_pipeline(&["noop"], PipelineContext::new(1).unwrap())
        .unwrap();
    let mut reader = FileReader::new("/definitely/not/here.txt", Value::Null);
    assert!(pipeline.run(&mut reader, None).is_err());
}
