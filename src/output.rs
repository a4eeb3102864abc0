//! Scoped output redirection.
//!
//! Test bodies write through [`OutputSinks`] (`ctx.cout()` / `ctx.cerr()`).
//! Normally the writers pass straight through to the process streams. While
//! a [`StreamRedirect`] guard is alive they append to in-memory buffers
//! instead, and dropping the guard moves the buffered text into the captured
//! strings and restores pass-through. The release happens in `Drop`, so it
//! runs on every exit path from the invocation.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

#[derive(Debug, Default)]
struct SinkState {
    redirected: bool,
    pending_out: Vec<u8>,
    pending_err: Vec<u8>,
    captured_out: String,
    captured_err: String,
}

/// Shared handle to the output streams seen by test bodies.
#[derive(Debug, Clone, Default)]
pub struct OutputSinks {
    state: Rc<RefCell<SinkState>>,
}

impl OutputSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writer(&self, stream: Stream) -> SinkWriter {
        SinkWriter {
            state: Rc::clone(&self.state),
            stream,
        }
    }

    pub fn is_redirected(&self) -> bool {
        self.state.borrow().redirected
    }

    /// Takes the text captured so far as `(stdout, stderr)`.
    pub fn take_captured(&self) -> (String, String) {
        let mut state = self.state.borrow_mut();
        (
            std::mem::take(&mut state.captured_out),
            std::mem::take(&mut state.captured_err),
        )
    }
}

/// `io::Write` handle for one stream.
pub struct SinkWriter {
    state: Rc<RefCell<SinkState>>,
    stream: Stream,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut state = self.state.borrow_mut();
            if state.redirected {
                match self.stream {
                    Stream::Out => state.pending_out.extend_from_slice(buf),
                    Stream::Err => state.pending_err.extend_from_slice(buf),
                }
                return Ok(buf.len());
            }
        }
        match self.stream {
            Stream::Out => io::stdout().write(buf),
            Stream::Err => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.state.borrow().redirected {
            return Ok(());
        }
        match self.stream {
            Stream::Out => io::stdout().flush(),
            Stream::Err => io::stderr().flush(),
        }
    }
}

/// Redirects both streams into buffers until dropped.
pub struct StreamRedirect {
    state: Rc<RefCell<SinkState>>,
    previously_redirected: bool,
}

impl StreamRedirect {
    pub fn engage(sinks: &OutputSinks) -> Self {
        let previously_redirected = {
            let mut state = sinks.state.borrow_mut();
            std::mem::replace(&mut state.redirected, true)
        };
        Self {
            state: Rc::clone(&sinks.state),
            previously_redirected,
        }
    }
}

impl Drop for StreamRedirect {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        let out = std::mem::take(&mut state.pending_out);
        let err = std::mem::take(&mut state.pending_err);
        state.captured_out.push_str(&String::from_utf8_lossy(&out));
        state.captured_err.push_str(&String::from_utf8_lossy(&err));
        state.redirected = self.previously_redirected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn redirect_captures_until_dropped() {
        let sinks = OutputSinks::new();
        {
            let _guard = StreamRedirect::engage(&sinks);
            assert!(sinks.is_redirected());
            write!(sinks.writer(Stream::Out), "hello ").unwrap();
            writeln!(sinks.writer(Stream::Err), "oops").unwrap();
            write!(sinks.writer(Stream::Out), "world").unwrap();
        }
        assert!(!sinks.is_redirected());
        assert_eq!(
            sinks.take_captured(),
            ("hello world".to_string(), "oops\n".to_string())
        );
        assert_eq!(sinks.take_captured(), (String::new(), String::new()));
    }

    #[test]
    fn redirect_is_released_when_unwinding() {
        let sinks = OutputSinks::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = StreamRedirect::engage(&sinks);
            write!(sinks.writer(Stream::Out), "before the panic").unwrap();
            panic!("body blew up");
        }));
        assert!(result.is_err());
        assert!(!sinks.is_redirected());
        assert_eq!(sinks.take_captured().0, "before the panic");
    }

    #[test]
    fn captured_text_accumulates_across_redirects() {
        let sinks = OutputSinks::new();
        for pass in 0..2 {
            let _guard = StreamRedirect::engage(&sinks);
            write!(sinks.writer(Stream::Out), "pass {};", pass).unwrap();
        }
        assert_eq!(sinks.take_captured().0, "pass 0;pass 1;");
    }
}
