//! Background import of filed records.
//!
//! An [`ImportStage`] drains a record source into a [`RecordSink`] until the
//! source is exhausted or its [`StopHandle`] is triggered, then lets the sink
//! commit or roll back. Progress and the outcome are reported as
//! [`ImportEvent`]s on a channel so a caller on another thread can follow along.

use crate::error::{ReportError, Result};
use crate::store::{FiledRecord, InMemoryStore};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Consumer side of an import.
pub trait RecordSink<R> {
    fn accept(&mut self, record: R) -> Result<()>;

    /// `completed` is `false` when the import was stopped or failed, in which
    /// case accepted records should be discarded.
    fn finish(&mut self, completed: bool) -> Result<()>;
}

/// Thread-safe flag that asks a running import to stop after the current record.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    Message(String),
    /// Emitted once the sink has finished without error.
    Finished { completed: bool, records: usize },
    /// Emitted instead of `Finished` when reading or the sink failed.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub completed: bool,
    pub records: usize,
}

pub struct ImportStage<I, K> {
    source: I,
    sink: K,
    stop: StopHandle,
    events: Sender<ImportEvent>,
    progress_interval: Option<usize>,
}

impl<I, K, R> ImportStage<I, K>
where
    I: Iterator<Item = Result<R>>,
    K: RecordSink<R>,
{
    pub fn new(source: impl IntoIterator<IntoIter = I>, sink: K) -> (Self, Receiver<ImportEvent>) {
        let (events, receiver) = mpsc::channel();
        let stage = Self {
            source: source.into_iter(),
            sink,
            stop: StopHandle::new(),
            events,
            progress_interval: None,
        };
        (stage, receiver)
    }

    /// Emits a progress message every `interval` records.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = (interval > 0).then_some(interval);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn run(mut self) -> Result<ImportSummary> {
        let outcome = self.read().and_then(|summary| {
            self.sink.finish(summary.completed)?;
            Ok(summary)
        });

        match outcome {
            Ok(summary) => {
                info!(
                    "Import {} after {} record(s)",
                    if summary.completed { "completed" } else { "stopped" },
                    summary.records
                );
                self.emit(ImportEvent::Finished {
                    completed: summary.completed,
                    records: summary.records,
                });
                Ok(summary)
            }
            Err(e) => {
                warn!("Import failed: {}", e);
                if let Err(rollback) = self.sink.finish(false) {
                    warn!("Rollback after failed import also failed: {}", rollback);
                }
                self.emit(ImportEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn read(&mut self) -> Result<ImportSummary> {
        let mut records = 0;

        loop {
            if self.stop.is_stopped() {
                debug!("Import stop requested after {} record(s)", records);
                return Ok(ImportSummary {
                    completed: false,
                    records,
                });
            }

            let Some(record) = self.source.next() else {
                break;
            };

            self.sink.accept(record?)?;
            records += 1;

            if let Some(interval) = self.progress_interval {
                if records % interval == 0 {
                    self.emit(ImportEvent::Message(format!("Imported {} records", records)));
                }
            }
        }

        Ok(ImportSummary {
            completed: true,
            records,
        })
    }

    fn emit(&self, event: ImportEvent) {
        if self.events.send(event).is_err() {
            debug!("Import event dropped: no receiver");
        }
    }
}

impl<I, K, R> ImportStage<I, K>
where
    I: Iterator<Item = Result<R>> + Send + 'static,
    K: RecordSink<R> + Send + 'static,
{
    /// Runs the stage on a named worker thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<ImportSummary>>> {
        let handle = thread::Builder::new()
            .name("statement-import".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }
}

/// Stages records and commits them to a shared [`InMemoryStore`] only when the
/// import completes.
#[derive(Debug)]
pub struct StoreSink {
    store: Arc<Mutex<InMemoryStore>>,
    pending: Vec<FiledRecord>,
}

impl StoreSink {
    pub fn new(store: Arc<Mutex<InMemoryStore>>) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl RecordSink<FiledRecord> for StoreSink {
    fn accept(&mut self, record: FiledRecord) -> Result<()> {
        self.pending.push(record);
        Ok(())
    }

    fn finish(&mut self, completed: bool) -> Result<()> {
        if !completed {
            debug!("Rolling back {} staged record(s)", self.pending.len());
            self.pending.clear();
            return Ok(());
        }

        let mut store = self
            .store
            .lock()
            .map_err(|e| ReportError::Store(format!("Store lock poisoned: {}", e)))?;

        let committed = self.pending.len();
        for record in self.pending.drain(..) {
            store.insert(record);
        }
        debug!("Committed {} record(s)", committed);
        Ok(())
    }
}
