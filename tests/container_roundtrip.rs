//! Round-trip and format-integrity tests for the container codec.

use std::fs;

use tethercount::TcResult;
use tethercount::container::{ContainerReader, ContainerWriter, write_lines};
use tethercount::model::{Record, Schema};

#[test]
fn lines_round_trip_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lines.tcf");

    let lines = [
        "the quick brown fox jumps over the lazy dog",
        "",
        "  leading and trailing whitespace survive verbatim  ",
        "unicode: grüße aus dem häuschen ✓",
        "tabs\tand\tinterior\twhitespace",
    ];
    write_lines(&path, lines).expect("write");

    let reader = ContainerReader::open(&path).expect("open");
    let read: Vec<Record> = reader.collect::<TcResult<_>>().expect("read");
    let expected: Vec<Record> = lines
        .iter()
        .map(|line| Record::Text((*line).to_owned()))
        .collect();
    assert_eq!(read, expected, "read order must equal write order");
}

#[test]
fn large_dataset_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("large.tcf");

    let lines: Vec<String> = (0..5000)
        .map(|i| format!("line {i} carries a handful of words"))
        .collect();
    let written = write_lines(&path, &lines).expect("write");
    assert_eq!(written, 5000);

    let reader = ContainerReader::open(&path).expect("open");
    let mut count = 0usize;
    for (i, record) in reader.enumerate() {
        let record = record.expect("record");
        assert_eq!(record, Record::Text(lines[i].clone()));
        count += 1;
    }
    assert_eq!(count, 5000);
}

#[test]
fn pair_container_round_trips_negative_and_large_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pairs.tcf");

    let pairs = [
        Record::pair("zero", 0),
        Record::pair("negative", -42),
        Record::pair("max", i64::MAX),
        Record::pair("min", i64::MIN),
    ];

    let mut writer = ContainerWriter::create(&path, Schema::word_count_pair()).expect("create");
    writer.append_all(&pairs).expect("append");
    writer.finish().expect("finish");

    let reader = ContainerReader::open(&path).expect("open");
    assert_eq!(reader.schema(), &Schema::word_count_pair());
    let read: Vec<Record> = reader.collect::<TcResult<_>>().expect("read");
    assert_eq!(read, pairs);
}

#[test]
fn reread_requires_reopening() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lines.tcf");
    write_lines(&path, ["one", "two"]).expect("write");

    let mut reader = ContainerReader::open(&path).expect("open");
    assert_eq!(reader.by_ref().count(), 2);
    assert_eq!(reader.count(), 0, "the traversal is single-pass");

    let reopened = ContainerReader::open(&path).expect("reopen");
    assert_eq!(reopened.count(), 2, "a fresh handle starts from the top");
}

#[test]
fn schema_header_survives_the_trip() {
    let dir = tempfile::tempdir().expect("tempdir");

    let text_path = dir.path().join("text.tcf");
    write_lines(&text_path, ["x"]).expect("write");
    assert_eq!(
        ContainerReader::open(&text_path).expect("open").schema(),
        &Schema::text()
    );

    let pair_path = dir.path().join("pair.tcf");
    ContainerWriter::create(&pair_path, Schema::word_count_pair())
        .expect("create")
        .finish()
        .expect("finish");
    assert_eq!(
        ContainerReader::open(&pair_path).expect("open").schema(),
        &Schema::word_count_pair()
    );
}

#[test]
fn overwriting_replaces_previous_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lines.tcf");

    write_lines(&path, ["old", "contents", "here"]).expect("first write");
    write_lines(&path, ["fresh"]).expect("second write");

    let reader = ContainerReader::open(&path).expect("open");
    let read: Vec<Record> = reader.collect::<TcResult<_>>().expect("read");
    assert_eq!(read, vec![Record::Text("fresh".to_owned())]);
}

#[test]
fn an_empty_file_is_corrupt_not_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("zero.tcf");
    fs::write(&path, b"").expect("write");

    let err = ContainerReader::open(&path).expect_err("no header");
    assert_eq!(err.error_code(), "TC-CORRUPT");
}
