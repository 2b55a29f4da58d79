pub mod ast_interpreter;
pub mod ir_interpreter;

use std::cell::RefCell;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("IO Error")]
    Io(
        #[from]
        io::Error,
    ),

    #[error("data pointer ({pointer}) out of bounds (tape length {len})")]
    OutOfBounds { pointer: i64, len: usize },

    #[error("call to unknown external routine `{0}`")]
    UnknownExternal(String),

    #[error("unsupported construct in module: {0}")]
    Unsupported(String),

    #[error("gave up after {0} steps")]
    StepLimitExceeded(u64),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The machine both interpreters run on: a tape, a data pointer and two byte streams
pub struct Runtime {
    /// Pointer into the tape, may wander off it; only dereferencing is checked
    data_pointer: i64,

    /// Our statically allocated tape
    tape: Vec<u8>,

    in_stream: Box<dyn Read>,
    out_stream: Box<dyn Write>,

    /// How many characters were written so far
    output_calls: usize,
}

impl Runtime {
    pub fn new(tape_size: usize, in_stream: Box<dyn Read>, out_stream: Box<dyn Write>) -> Self {
        Self {
            data_pointer: 0,
            tape: vec![0; tape_size],
            in_stream,
            out_stream,
            output_calls: 0,
        }
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn tape_mut(&mut self) -> &mut [u8] {
        &mut self.tape
    }

    pub fn output_calls(&self) -> usize {
        self.output_calls
    }

    /// Like `getchar(3)`: the next byte, or -1 at the end of input
    pub fn getchar(&mut self) -> Result<i32> {
        let mut one_byte = [0u8];
        loop {
            match self.in_stream.read(&mut one_byte) {
                Ok(0) => return Ok(-1),
                Ok(_) => return Ok(i32::from(one_byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Like `putchar(3)`, writes the low byte of `c`
    pub fn putchar(&mut self, c: i32) -> Result<i32> {
        self.output_calls += 1;
        self.out_stream.write_all(&[c as u8])?;
        Ok(c & 0xFF)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out_stream.flush()?;
        Ok(())
    }

    /// Read one byte into the cell at the data pointer, EOF stores 255 like `(char) getchar()`
    pub fn read(&mut self) -> Result<()> {
        let c = self.getchar()?;
        *self.cell_mut()? = c as u8;
        Ok(())
    }

    /// Write the cell at the data pointer, unbuffered
    pub fn write(&mut self) -> Result<()> {
        let c = self.cell()?;
        self.putchar(i32::from(c))?;
        self.flush()
    }

    pub fn deref_and_add_value(&mut self, by: u8) -> Result<()> {
        let cell = self.cell_mut()?;
        *cell = cell.wrapping_add(by);
        Ok(())
    }

    pub fn deref_and_sub_value(&mut self, by: u8) -> Result<()> {
        let cell = self.cell_mut()?;
        *cell = cell.wrapping_sub(by);
        Ok(())
    }

    pub fn shift_data_pointer(&mut self, by: i64) {
        self.data_pointer += by;
        // we don't check that the data pointer is valid on shifts
        // we only check that it's valid once it's read/written to
    }

    /// is the value at the data pointer zero?
    pub fn value_is_zero(&self) -> Result<bool> {
        Ok(self.cell()? == 0)
    }

    /// Index into the tape, if `pointer` is on it
    pub fn check_pointer(&self, pointer: i64) -> Result<usize> {
        if pointer < 0 || pointer as usize >= self.tape.len() {
            return Err(RuntimeError::OutOfBounds {
                pointer,
                len: self.tape.len(),
            });
        }
        Ok(pointer as usize)
    }

    fn cell(&self) -> Result<u8> {
        let index = self.check_pointer(self.data_pointer)?;
        Ok(self.tape[index])
    }

    fn cell_mut(&mut self) -> Result<&mut u8> {
        let index = self.check_pointer(self.data_pointer)?;
        Ok(&mut self.tape[index])
    }
}

/// A `Write` whose contents can still be read after it was boxed into a [Runtime]
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(input: &'static [u8]) -> (Runtime, SharedBuffer) {
        let out = SharedBuffer::new();
        let rt = Runtime::new(4, Box::new(input), Box::new(out.clone()));
        (rt, out)
    }

    #[test]
    fn cells_wrap_around() {
        let (mut rt, _) = runtime(b"");
        rt.deref_and_sub_value(1).unwrap();
        assert_eq!(rt.tape()[0], 255);
        rt.deref_and_add_value(1).unwrap();
        assert_eq!(rt.tape()[0], 0);
    }

    #[test]
    fn end_of_input_reads_as_255() {
        let (mut rt, _) = runtime(b"A");
        rt.read().unwrap();
        assert_eq!(rt.tape()[0], b'A');
        assert_eq!(rt.getchar().unwrap(), -1);
        rt.read().unwrap();
        assert_eq!(rt.tape()[0], 255);
    }

    #[test]
    fn pointer_is_checked_on_dereference_only() {
        let (mut rt, _) = runtime(b"");
        rt.shift_data_pointer(-1);
        assert!(matches!(
            rt.value_is_zero(),
            Err(RuntimeError::OutOfBounds { pointer: -1, len: 4 })
        ));
        rt.shift_data_pointer(1);
        assert!(rt.value_is_zero().unwrap());
    }

    #[test]
    fn writes_are_counted() {
        let (mut rt, out) = runtime(b"");
        rt.deref_and_add_value(b'!').unwrap();
        rt.write().unwrap();
        rt.write().unwrap();
        assert_eq!(out.contents(), b"!!");
        assert_eq!(rt.output_calls(), 2);
    }
}
