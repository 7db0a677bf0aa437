//! Console Interface
//!
//! The keyboard and display drivers live outside this crate; the process
//! manager sees them as a byte source and a byte sink.
//!
//! # Security Considerations
//! - Console output is shared by all processes; whole buffers are written
//!   in one call so lines from different processes do not interleave

use alloc::string::String;
use core::fmt::{self, Write};

/// Console device.
pub trait Console: Send + Sync {
    /// Read one byte of keyboard input, waiting if none is available.
    fn getc(&self) -> u8;

    /// Write a buffer to the display.
    fn putbuf(&self, buf: &[u8]);
}

/// Buffered `core::fmt` adapter over a [`Console`].
///
/// Formatted text collects in memory and reaches the console in a single
/// `putbuf` when the writer is flushed or dropped.
pub struct ConsoleWriter<'a> {
    console: &'a dyn Console,
    line: String,
}

impl<'a> ConsoleWriter<'a> {
    pub fn new(console: &'a dyn Console) -> Self {
        Self {
            console,
            line: String::new(),
        }
    }

    /// Write out everything buffered so far.
    pub fn flush(&mut self) {
        if !self.line.is_empty() {
            self.console.putbuf(self.line.as_bytes());
            self.line.clear();
        }
    }
}

impl Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.line.push_str(s);
        Ok(())
    }
}

impl Drop for ConsoleWriter<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Print a formatted line to a console reference in one write.
#[macro_export]
macro_rules! console_println {
    ($console:expr, $($arg:tt)*) => {{
        use core::fmt::Write;
        let mut writer = $crate::drivers::ConsoleWriter::new($console);
        let _ = writeln!(writer, $($arg)*);
    }};
}
