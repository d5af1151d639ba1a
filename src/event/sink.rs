use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tokio::sync::mpsc;

use super::Event;

/// Consumer of the ordered event stream. Emission is fire-and-forget: a sink
/// that fails logs the problem and carries on.
pub trait EventSink: Send {
    fn emit(&mut self, event: &Event);

    fn flush(&mut self) {}
}

/// Human-readable one-line-per-event output on stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &Event) {
        println!("{}", event);
    }
}

/// Appends one JSON object per event to a file.
pub struct JsonLinesSink<W: Write + Send = File> {
    out: BufWriter<W>,
}

impl JsonLinesSink<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }

    fn write_line(&mut self, event: &Event) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &Event) {
        if let Err(e) = self.write_line(event) {
            log::warn!("Failed to write event log line: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            log::warn!("Failed to flush event log: {}", e);
        }
    }
}

/// Fans every event out to each inner sink in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiSink {
    fn emit(&mut self, event: &Event) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

/// Drains the channel into `sink` in arrival order until every sender is
/// dropped.
pub async fn run_sink<S: EventSink>(mut rx: mpsc::Receiver<Event>, mut sink: S) -> S {
    while let Some(event) = rx.recv().await {
        sink.emit(&event);
    }
    sink.flush();
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TrackKind;

    #[derive(Default)]
    struct Collect(Vec<String>);

    impl EventSink for Collect {
        fn emit(&mut self, event: &Event) {
            self.0.push(event.label.clone());
        }
    }

    #[test]
    fn json_lines_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&Event::info(TrackKind::System, "a", "first"));
        sink.emit(&Event::warn(TrackKind::System, "b", "second").with("n", 2));

        let bytes = sink.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["label"], "second");
        assert_eq!(second["meta"]["n"], 2);
    }

    #[test]
    fn json_lines_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");

        for label in ["one", "two"] {
            let mut sink = JsonLinesSink::open(&path).unwrap();
            sink.emit(&Event::info(TrackKind::System, "x", label));
        }

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn run_sink_preserves_order() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_sink(rx, Collect::default()));
        for label in ["a", "b", "c", "d", "e"] {
            tx.send(Event::info(TrackKind::System, "k", label)).await.unwrap();
        }
        drop(tx);

        let sink = handle.await.unwrap();
        assert_eq!(sink.0, vec!["a", "b", "c", "d", "e"]);
    }
}
