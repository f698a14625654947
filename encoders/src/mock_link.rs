//! In-memory serial link for exercising wire protocols without hardware.
//!
//! Replies are queued up front; reads drain them and report a timeout once
//! the queue is empty, the way a real port with nothing to say behaves.
//! Everything written is recorded for inspection.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct LinkState {
    replies: VecDeque<u8>,
    written: Vec<u8>,
    fail_writes: bool,
}

/// Cloneable scripted link; clones share the same buffers.
#[derive(Clone, Default)]
pub struct ScriptedLink {
    state: Arc<Mutex<LinkState>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append bytes the device will "send" next.
    pub fn queue_reply(&self, bytes: &[u8]) {
        self.state().replies.extend(bytes.iter().copied());
    }

    /// All bytes written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    /// Return and clear the bytes written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().written)
    }

    /// Make subsequent writes fail with a broken pipe.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.replies.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply queued"));
        }
        let count = buf.len().min(state.replies.len());
        for slot in buf.iter_mut().take(count) {
            // count <= replies.len(), so pop_front always yields
            *slot = state.replies.pop_front().unwrap_or_default();
        }
        Ok(count)
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"));
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
