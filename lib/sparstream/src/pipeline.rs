//! Producer thread feeding a bounded queue, for the parsers built on push-style XML readers.

use crate::error::ParseError;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{Builder, JoinHandle};
use tracing::{debug, trace};

/// Number of parsed items the producer may get ahead of the consumer.
pub const QUEUE_CAPACITY: usize = 128;

/// The consumer side: an iterator over what the producer thread parsed.
///
/// Dropping it signals the producer to stop, closes the queue and joins the thread,
/// so an abandoned iteration never leaks the producer.
pub(crate) struct Pipeline<T: Send + 'static> {
    receiver: Option<Receiver<Result<T, ParseError>>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// The producer side handed to the parsing closure.
pub(crate) struct Producer<T> {
    sender: SyncSender<Result<T, ParseError>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> Producer<T> {
    /// Pushes an item, blocking while the queue is full.
    ///
    /// Returns `false` once the consumer is gone: the producer must then stop.
    pub(crate) fn send(&self, item: T) -> bool {
        !self.is_cancelled() && self.sender.send(Ok(item)).is_ok()
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Starts `produce` on a new thread.
    ///
    /// An error returned by `produce` is forwarded to the consumer as the last item.
    pub(crate) fn spawn(
        name: &str,
        produce: impl FnOnce(&Producer<T>) -> Result<(), ParseError> + Send + 'static,
    ) -> io::Result<Self> {
        let (sender, receiver) = sync_channel(QUEUE_CAPACITY);
        let cancelled = Arc::new(AtomicBool::new(false));
        let producer = Producer {
            sender,
            cancelled: Arc::clone(&cancelled),
        };
        let thread_name = name.to_owned();
        let handle = Builder::new().name(name.into()).spawn(move || {
            trace!("{thread_name} producer started");
            if let Err(error) = produce(&producer) {
                if producer.is_cancelled() {
                    trace!("{thread_name} producer stopped after cancellation: {error}");
                } else {
                    // The consumer might be gone already
                    producer.sender.send(Err(error)).ok();
                }
            }
            trace!("{thread_name} producer finished");
        })?;
        Ok(Self {
            receiver: Some(receiver),
            cancelled,
            handle: Some(handle),
        })
    }
}

impl<T: Send + 'static> Iterator for Pipeline<T> {
    type Item = Result<T, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.receiver.as_ref()?.recv().ok();
        if item.is_none() {
            self.receiver = None;
        }
        item
    }
}

impl<T: Send + 'static> Drop for Pipeline<T> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        // Unblocks a producer waiting on a full queue
        if self.receiver.take().is_some() {
            debug!("result stream abandoned before its end, stopping the producer");
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("the producer thread panicked");
            }
        }
    }
}
