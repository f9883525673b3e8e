//! Background reading of a release with a bounded hand-off to the consumer.
//!
//! The producer thread owns the [RecordParser] and pushes finished records into a
//! bounded channel, so it blocks whenever the consumer falls behind. Parse errors
//! travel through the channel like records. A producer that dies without reporting
//! (a panic) is noticed by the consumer when the channel disconnects or, while
//! waiting, through a liveness check on every poll timeout.

use std::io::BufRead;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use cvingest_core::{IngestError, Result};
use log::debug;

use crate::cancellation::Cancellation;
use crate::xml::{RecordNode, RecordParser, ReleaseHeader};

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub queue_capacity: usize,
    pub poll_interval: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

enum ReaderMessage {
    Header(ReleaseHeader),
    Record(RecordNode),
}

type Message = Result<ReaderMessage>;

/// Consumer side of a running release reader.
pub struct RecordStream {
    header: ReleaseHeader,
    receiver: Option<Receiver<Message>>,
    handle: Option<JoinHandle<()>>,
    cancel: Cancellation,
    poll_interval: Duration,
    done: bool,
}

/// Keep offering a message until it is taken, the consumer is gone, or the run is cancelled.
fn deliver(tx: &Sender<Message>, mut msg: Message, cancel: &Cancellation, poll: Duration) -> bool {
    loop {
        match tx.send_timeout(msg, poll) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                msg = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

fn produce<R: BufRead>(input: R, tx: Sender<Message>, cancel: Cancellation, poll: Duration) {
    let mut parser = RecordParser::new(input);

    match parser.read_header() {
        Ok(header) => {
            if !deliver(&tx, Ok(ReaderMessage::Header(header)), &cancel, poll) {
                return;
            }
        }
        Err(e) => {
            deliver(&tx, Err(e), &cancel, poll);
            return;
        }
    }

    let mut count: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            debug!("Reader cancelled after {} records", count);
            return;
        }
        match parser.next_record() {
            Ok(Some(record)) => {
                count += 1;
                if !deliver(&tx, Ok(ReaderMessage::Record(record)), &cancel, poll) {
                    debug!("Consumer stopped after {} records", count);
                    return;
                }
            }
            Ok(None) => {
                debug!("Reader finished after {} records", count);
                return;
            }
            Err(e) => {
                deliver(&tx, Err(e), &cancel, poll);
                return;
            }
        }
    }
}

fn join_producer(handle: JoinHandle<()>) -> Result<()> {
    handle.join().map_err(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "reader thread panicked".to_string());
        IngestError::ProducerFailure(reason)
    })
}

pub struct ReleaseReader;

impl ReleaseReader {
    ///
    /// Start reading a release on a background thread.
    ///
    /// Blocks until the root element has been parsed so the release date is known.
    ///
    /// # Arguments
    /// - input: the (already decompressed) release bytes
    /// - options: channel capacity and poll interval
    /// - cancel: shared cancellation flag, checked between records by both sides
    ///
    pub fn spawn<R>(input: R, options: ReaderOptions, cancel: Cancellation) -> Result<RecordStream>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = bounded::<Message>(options.queue_capacity.max(1));
        let poll = options.poll_interval;
        let producer_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("cvingest-reader".to_string())
            .spawn(move || produce(input, tx, producer_cancel, poll))?;

        let header = match rx.recv() {
            Ok(Ok(ReaderMessage::Header(header))) => header,
            Ok(Ok(ReaderMessage::Record(_))) => {
                return Err(IngestError::ProducerFailure(
                    "record received before release header".to_string(),
                ));
            }
            Ok(Err(e)) => {
                drop(rx);
                join_producer(handle)?;
                return Err(e);
            }
            Err(_) => {
                join_producer(handle)?;
                return Err(IngestError::ProducerFailure(
                    "reader stopped before the release header".to_string(),
                ));
            }
        };

        Ok(RecordStream {
            header,
            receiver: Some(rx),
            handle: Some(handle),
            cancel,
            poll_interval: poll,
            done: false,
        })
    }
}

impl RecordStream {
    pub fn header(&self) -> &ReleaseHeader {
        &self.header
    }

    pub fn release_date(&self) -> Option<&str> {
        self.header.release_date.as_deref()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Drop the channel and wait for the producer to exit.
    fn shutdown(&mut self) -> Result<()> {
        self.done = true;
        self.receiver = None;
        match self.handle.take() {
            Some(handle) => join_producer(handle),
            None => Ok(()),
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<RecordNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                return self.shutdown().err().map(Err);
            }

            let rx = self.receiver.as_ref()?;
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(ReaderMessage::Record(record))) => return Some(Ok(record)),
                Ok(Ok(ReaderMessage::Header(_))) => continue,
                Ok(Err(e)) => {
                    let _ = self.shutdown();
                    return Some(Err(e));
                }
                Err(RecvTimeoutError::Timeout) => {
                    let producer_gone = self
                        .handle
                        .as_ref()
                        .is_none_or(|handle| handle.is_finished());
                    if producer_gone && rx.is_empty() {
                        return match self.shutdown() {
                            Ok(()) => None,
                            Err(e) => Some(Err(e)),
                        };
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return self.shutdown().err().map(Err);
                }
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
