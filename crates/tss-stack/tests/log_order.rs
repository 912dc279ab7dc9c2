//! The audit log written through `FileSink` matches the stack's history.

#![cfg(not(loom))]

use std::fs;

use tss_stack::{EmptyStack, FileSink, Stack};

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_sequential_log_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");

    let stack = Stack::with_event_sink(FileSink::create(&path).unwrap());
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    stack.push(3).unwrap();
    assert_eq!(stack.pop(), Ok(3));
    assert_eq!(stack.pop(), Ok(2));
    stack.flush_sink().unwrap();

    assert_eq!(
        read_lines(&path),
        vec!["Pushed 1", "Pushed 2", "Pushed 3", "Popped 3", "Popped 2"]
    );
    assert_eq!(stack.len(), 1);
}

#[test]
fn test_empty_pop_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");

    let stack: Stack<i64, _> = Stack::with_event_sink(FileSink::create(&path).unwrap());
    assert_eq!(stack.pop(), Err(EmptyStack));
    stack.push(0).unwrap();
    assert_eq!(stack.pop(), Ok(0));
    assert_eq!(stack.pop(), Err(EmptyStack));
    stack.flush_sink().unwrap();

    assert_eq!(read_lines(&path), vec!["Pushed 0", "Popped 0"]);
    assert_eq!(stack.stats().empty_pops, 2);
}

#[test]
fn test_log_truncated_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");
    fs::write(&path, "Pushed 99\nPushed 98\n").unwrap();

    let stack = Stack::with_event_sink(FileSink::create(&path).unwrap());
    stack.push(7).unwrap();
    let sink = stack.into_sink();
    assert_eq!(sink.lines_written(), 1);
    drop(sink.into_inner().unwrap());

    assert_eq!(read_lines(&path), vec!["Pushed 7"]);
}

#[test]
fn test_drain_logs_each_released_node() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");

    let stack = Stack::with_event_sink(FileSink::create(&path).unwrap());
    for i in 0..10 {
        stack.push(i).unwrap();
    }
    assert_eq!(stack.drain(), 10);
    assert_eq!(stack.drain(), 0);

    // Drain flushed the push lines followed by one pop line per node.
    let lines = read_lines(&path);
    assert_eq!(lines.len(), 20);
    assert_eq!(lines[9], "Pushed 9");
    assert_eq!(lines[10], "Popped 9");
    assert_eq!(lines[19], "Popped 0");
    assert!(stack.is_empty());
}

#[test]
fn test_log_replays_to_final_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");

    let stack = Stack::with_event_sink(FileSink::create(&path).unwrap());
    for i in 0..100u32 {
        stack.push(i).unwrap();
        if i % 3 == 2 {
            stack.pop().unwrap();
        }
    }
    stack.flush_sink().unwrap();

    let mut replayed = Vec::new();
    for line in read_lines(&path) {
        match line.split_once(' ').unwrap() {
            ("Pushed", v) => replayed.push(v.parse::<u32>().unwrap()),
            ("Popped", v) => assert_eq!(replayed.pop(), Some(v.parse().unwrap())),
            other => panic!("unexpected line {:?}", other),
        }
    }
    replayed.reverse();
    assert_eq!(replayed, stack.snapshot());
}
