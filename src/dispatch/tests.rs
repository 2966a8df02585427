use super::{spawn_reader, Delivery, EventQueue, LinkNotice, ReaderExit};
use crate::journal::EventJournal;
use crate::link::memory::{ChannelReader, RecordingWriter, ScriptedReader, WhenExhausted};
use crate::link::{LineReader, LinkState, ReadOutcome, SharedWriter};
use crate::protocol::Event;
use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn scratch_journal(name: &str) -> (Arc<EventJournal>, PathBuf) {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = env::temp_dir().join(format!(
        "groundlink_dispatch_{name}_{}_{n}.csv",
        std::process::id()
    ));
    let _ = fs::remove_file(&path);
    (Arc::new(EventJournal::open(&path).expect("open journal")), path)
}

fn shared_writer() -> (SharedWriter, RecordingWriter) {
    let recorder = RecordingWriter::new();
    let link = crate::link::Link::new(
        "test",
        Box::new(ScriptedReader::from_lines(Vec::<String>::new())),
        Box::new(recorder.clone()),
    );
    let (_, writer) = link.into_parts();
    (writer, recorder)
}

fn collect_events(queue: &mut EventQueue) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    queue.subscribe_events(move |event| sink.borrow_mut().push(event.clone()));
    seen
}

fn collect_notices(queue: &mut EventQueue) -> Rc<RefCell<Vec<LinkNotice>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    queue.subscribe_notices(move |notice| sink.borrow_mut().push(notice.clone()));
    seen
}

fn pump_until(queue: &mut EventQueue, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() && Instant::now() < deadline {
        queue.wait_and_drain(Duration::from_millis(20));
    }
}

fn wait_finished(handle: &super::ReaderHandle) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn events_reach_subscribers_in_decode_order() {
    let (journal, path) = scratch_journal("order");
    let (writer, _) = shared_writer();
    let mut queue = EventQueue::new();
    let events = collect_events(&mut queue);

    let reader = ScriptedReader::from_lines(["OBJECT", "TEMP:25", "CLEAR"]);
    let handle = spawn_reader(
        Box::new(reader),
        writer,
        Arc::clone(&journal),
        queue.sender(),
        "scripted".to_string(),
    );
    pump_until(&mut queue, || events.borrow().len() >= 3);
    wait_finished(&handle);

    assert_eq!(
        *events.borrow(),
        vec![
            Event::ObjectDetected,
            Event::Temperature {
                value: "25".to_string()
            },
            Event::ObjectCleared,
        ]
    );
    assert_eq!(handle.shutdown(), ReaderExit::LinkLost);

    let logged: Vec<_> = journal
        .query("")
        .expect("query")
        .into_iter()
        .map(|r| r.description)
        .collect();
    assert_eq!(
        logged,
        vec!["Object Detected", "Temperature: 25 °C", "Object Cleared"]
    );
    let _ = fs::remove_file(path);
}

#[test]
fn timeouts_do_not_stop_the_loop() {
    let (journal, path) = scratch_journal("timeout");
    let (writer, _) = shared_writer();
    let mut queue = EventQueue::new();
    let events = collect_events(&mut queue);

    let (tx, reader) = ChannelReader::channel(Duration::from_millis(5));
    let handle = spawn_reader(
        Box::new(reader),
        writer,
        journal,
        queue.sender(),
        "channel".to_string(),
    );

    // Several read timeouts elapse with nothing on the wire.
    std::thread::sleep(Duration::from_millis(60));
    assert!(!handle.is_finished());
    tx.send("LIGHT:512".to_string()).expect("send");
    pump_until(&mut queue, || !events.borrow().is_empty());

    assert_eq!(
        *events.borrow(),
        vec![Event::LightLevel {
            value: "512".to_string()
        }]
    );
    assert_eq!(handle.shutdown(), ReaderExit::Shutdown);
    let _ = fs::remove_file(path);
}

#[test]
fn link_loss_is_reported_once_and_closes_writer() {
    let (journal, path) = scratch_journal("lost");
    let (writer, _) = shared_writer();
    let mut queue = EventQueue::new();
    let events = collect_events(&mut queue);
    let notices = collect_notices(&mut queue);

    let reader = ScriptedReader::from_lines(["OBJECT"]);
    let handle = spawn_reader(
        Box::new(reader),
        writer.clone(),
        journal,
        queue.sender(),
        "scripted".to_string(),
    );
    pump_until(&mut queue, || !notices.borrow().is_empty());
    assert_eq!(handle.shutdown(), ReaderExit::LinkLost);
    queue.drain();

    assert_eq!(*events.borrow(), vec![Event::ObjectDetected]);
    assert_eq!(notices.borrow().len(), 1);
    assert!(matches!(notices.borrow()[0], LinkNotice::LinkLost(_)));
    assert_eq!(writer.state(), LinkState::Closed);
    let _ = fs::remove_file(path);
}

#[test]
fn blank_lines_are_skipped_and_noise_passes_through() {
    let (journal, path) = scratch_journal("noise");
    let (writer, _) = shared_writer();
    let mut queue = EventQueue::new();
    let events = collect_events(&mut queue);

    let reader = ScriptedReader::new(
        [
            Ok(ReadOutcome::Line(String::new())),
            Ok(ReadOutcome::Timeout),
            Ok(ReadOutcome::Line("  ".to_string())),
            Ok(ReadOutcome::Line("BOOT v1.2".to_string())),
        ],
        WhenExhausted::Idle(Duration::from_millis(5)),
    );
    let handle = spawn_reader(
        Box::new(reader),
        writer,
        Arc::clone(&journal),
        queue.sender(),
        "scripted".to_string(),
    );
    pump_until(&mut queue, || !events.borrow().is_empty());
    assert_eq!(handle.shutdown(), ReaderExit::Shutdown);

    assert_eq!(
        *events.borrow(),
        vec![Event::Unrecognized {
            raw: "BOOT v1.2".to_string()
        }]
    );
    let logged = journal.query("").expect("query");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].description, "Unrecognized: BOOT v1.2");
    let _ = fs::remove_file(path);
}

#[test]
fn shutdown_stops_an_idle_reader() {
    let (journal, path) = scratch_journal("shutdown");
    let (writer, _) = shared_writer();
    let queue = EventQueue::new();
    let reader = ScriptedReader::new([], WhenExhausted::Idle(Duration::from_millis(5)));
    let handle = spawn_reader(
        Box::new(reader),
        writer.clone(),
        journal,
        queue.sender(),
        "idle".to_string(),
    );
    let started = Instant::now();
    assert_eq!(handle.shutdown(), ReaderExit::Shutdown);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(writer.state(), LinkState::Open);
    let _ = fs::remove_file(path);
}

#[test]
fn drain_without_pending_items_returns_zero() {
    let mut queue = EventQueue::new();
    assert_eq!(queue.drain(), 0);
    assert_eq!(queue.wait_and_drain(Duration::from_millis(1)), 0);
}

#[test]
fn every_subscriber_sees_every_event() {
    let mut queue = EventQueue::new();
    let first = collect_events(&mut queue);
    let second = collect_events(&mut queue);
    let tx = queue.sender();
    tx.send(Delivery::Event(Event::ObjectDetected)).expect("send");
    tx.send(Delivery::Event(Event::ObjectCleared)).expect("send");
    assert_eq!(queue.drain(), 2);
    assert_eq!(*first.borrow(), *second.borrow());
    assert_eq!(first.borrow().len(), 2);
}

struct PanickingReader;

impl LineReader for PanickingReader {
    fn read_line(&mut self) -> Result<ReadOutcome, crate::link::LinkError> {
        panic!("driver bug");
    }
}

#[test]
fn reader_panic_is_reported_on_join() {
    let (journal, path) = scratch_journal("panic");
    let (writer, _) = shared_writer();
    let queue = EventQueue::new();
    let handle = spawn_reader(
        Box::new(PanickingReader),
        writer,
        journal,
        queue.sender(),
        "panicky".to_string(),
    );
    wait_finished(&handle);
    assert_eq!(handle.shutdown(), ReaderExit::Panicked);
    let _ = fs::remove_file(path);
}
