mod support;

use std::sync::{Arc, Barrier};
use std::thread;

use ei::edit::{EditOperation, EditStreamEntry};
use ei::ingest::EditStream;
use support::TestWorkspace;

fn entry(agent: &str, file: &str) -> EditStreamEntry {
    EditStreamEntry::new(agent, file, EditOperation::Update).with_content("payload\n")
}

#[test]
fn parallel_appends_all_land() {
    let stream = EditStream::new();
    let threads = 12;
    let per_thread = 25;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for index in 0..threads {
        let stream = stream.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for edit in 0..per_thread {
                let agent = format!("agent-{index}");
                let file = format!("file-{edit}.rs");
                stream.append(entry(&agent, &file)).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = stream.snapshot();
    assert_eq!(snapshot.len(), threads * per_thread);

    // Every entry is fully formed; no partial writes are observable.
    for entry in &snapshot {
        assert!(entry.validate().is_ok());
    }
}

#[test]
fn snapshot_taken_mid_run_is_stable() {
    let stream = EditStream::new();
    for index in 0..10 {
        stream.append(entry("agent-a", &format!("f{index}.rs"))).unwrap();
    }

    let snapshot = stream.snapshot();
    let writer = {
        let stream = stream.clone();
        thread::spawn(move || {
            for index in 0..100 {
                stream
                    .append(entry("agent-b", &format!("late-{index}.rs")))
                    .unwrap();
            }
        })
    };
    writer.join().unwrap();

    assert_eq!(snapshot.len(), 10);
    assert!(snapshot.iter().all(|entry| entry.agent_id == "agent-a"));
    assert_eq!(stream.len(), 110);
}

#[test]
fn file_backed_log_survives_concurrent_writers() {
    let workspace = TestWorkspace::init();
    let threads = 8;
    let per_thread = 10;
    let barrier = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for index in 0..threads {
        let log = workspace.edit_log();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for edit in 0..per_thread {
                let agent = format!("agent-{index}");
                let file = format!("shared-{edit}.rs");
                log.append(&entry(&agent, &file)).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let entries = workspace.pending_edits();
    assert_eq!(entries.len(), threads * per_thread);
    for entry in &entries {
        assert!(entry.validate().is_ok());
    }
}
