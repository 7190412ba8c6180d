//! Streaming delivery
//!
//! In streaming mode the value of every target element is handed to a
//! [`DeliveryBuffer`] as soon as it is parsed, and its node is pruned from
//! the tree. The buffer is the handoff point between the parsing thread
//! and the consumer: `take` blocks until an item arrives or the buffer is
//! closed.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::values::Value;

use super::Parser;

#[derive(Debug, Default)]
struct BufferState {
    items: VecDeque<Result<Value>>,
    closed: bool,
}

/// Unbounded blocking queue of parsed values
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    state: Mutex<BufferState>,
    available: Condvar,
}

impl DeliveryBuffer {
    /// Create an open, empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Add an item; returns false when the buffer is already closed
    pub fn put(&self, item: Result<Value>) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        self.available.notify_one();
        true
    }

    /// Close the buffer. Returns true for the call that closed it.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.available.notify_all();
        true
    }

    /// Whether the buffer is closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Next item, blocking while the buffer is empty and open. `None`
    /// means the buffer is closed and drained.
    pub fn take(&self) -> Option<Result<Value>> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|p| p.into_inner());
        }
    }

    /// Next item if one is buffered
    pub fn try_take(&self) -> Option<Result<Value>> {
        self.lock().items.pop_front()
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocking iterator over the remaining items
    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        std::iter::from_fn(move || self.take())
    }
}

/// Parser running on its own thread, yielding the values of the streaming
/// target as they are parsed.
///
/// A parse failure is delivered as the last item.
pub struct StreamingParser {
    buffer: Arc<DeliveryBuffer>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StreamingParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingParser")
            .field("buffered", &self.buffer.len())
            .field("closed", &self.buffer.is_closed())
            .finish()
    }
}

impl StreamingParser {
    /// Start parsing `input` on a new thread. The parser's settings must
    /// name a streaming target.
    pub fn spawn<R>(mut parser: Parser, input: R) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        if parser.settings().streaming_target().is_none() {
            return Err(Error::Config("streaming parser needs a streaming target".to_string()));
        }
        let buffer = Arc::new(DeliveryBuffer::new());
        parser.set_buffer(buffer.clone());
        let delivery = buffer.clone();
        let handle = thread::Builder::new()
            .name("xmlbinding-stream".to_string())
            .spawn(move || {
                if let Err(e) = parser.run(input) {
                    debug!(error = %e, "streaming parse failed");
                    if !delivery.put(Err(e)) {
                        warn!("streaming parse failed after the consumer went away");
                    }
                }
                delivery.close();
            })?;
        Ok(Self {
            buffer,
            handle: Some(handle),
        })
    }

    /// The delivery buffer
    pub fn buffer(&self) -> &Arc<DeliveryBuffer> {
        &self.buffer
    }

    /// Wait for the parsing thread to finish
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Other("streaming parser thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Iterator for StreamingParser {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.take()
    }
}

impl Drop for StreamingParser {
    fn drop(&mut self) {
        // stops the parsing thread at the next delivery
        self.buffer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_happens_once() {
        let buffer = DeliveryBuffer::new();
        assert!(buffer.put(Ok(Value::Integer(1))));
        assert!(buffer.close());
        assert!(!buffer.close());
        assert!(!buffer.put(Ok(Value::Integer(2))));
        assert_eq!(buffer.take().unwrap().unwrap(), Value::Integer(1));
        assert!(buffer.take().is_none());
    }

    #[test]
    fn test_take_blocks_until_put() {
        let buffer = Arc::new(DeliveryBuffer::new());
        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            for i in 0..100 {
                producer.put(Ok(Value::Integer(i)));
            }
            producer.close();
        });
        let values: Vec<i64> = buffer.iter().map(|v| v.unwrap().as_integer().unwrap()).collect();
        handle.join().unwrap();
        assert_eq!(values, (0..100).collect::<Vec<_>>());
    }
}
