use std::io::{self, Write};
use std::sync::{Arc, Mutex};

mod exchange;
mod stats;

/// Writer shared between ranks so tests can read what the root printed.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub(crate) fn contents(&self) -> String {
        let bytes = self.0.lock().expect("shared buf lock").clone();
        String::from_utf8(bytes).expect("utf8 output")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("shared buf lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
