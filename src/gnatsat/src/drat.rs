//! DRAT proof tracing.
//!
//! The tracer receives every derived clause (addition), every clause that
//! becomes unreachable (deletion) and every derived unit, all in external
//! literal encoding so that renumbering of the internal variable space never
//! invalidates an emitted proof. Exactly one output format is active at a
//! time: ASCII (`<lit>* 0` / `d <lit>* 0` lines) or the standard binary
//! encoding (`a`/`d` marker byte followed by variable length literals).
//!
//! A write failure does not abort the search. The trace is marked broken and
//! search continues; the failure surfaces when the trace is closed.

use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Output format of the emitted proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofFormat {
    Ascii,
    Binary,
}

/// A DRAT proof emitter over a caller supplied sink.
pub struct Proof {
    out: Box<dyn Write>,
    format: ProofFormat,
    broken: bool,
    /// Clause additions emitted so far.
    added: u64,
    /// Clause deletions emitted so far.
    deleted: u64,
}

impl std::fmt::Debug for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Proof")
            .field("format", &self.format)
            .field("broken", &self.broken)
            .field("added", &self.added)
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl Proof {
    /// Trace to a caller owned sink. The sink is flushed but the caller
    /// remains responsible for closing whatever is behind it.
    pub fn from_writer(out: Box<dyn Write>, format: ProofFormat) -> Self {
        Self {
            out,
            format,
            broken: false,
            added: 0,
            deleted: 0,
        }
    }

    /// Open `path` for writing and trace into it. The file is owned, and
    /// therefore closed, by the solver.
    pub fn from_path(path: &str, format: ProofFormat) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(Self::from_writer(Box::new(file), format))
    }

    pub fn broken(&self) -> bool {
        self.broken
    }

    pub fn num_added(&self) -> u64 {
        self.added
    }

    pub fn num_deleted(&self) -> u64 {
        self.deleted
    }

    /// Emit the addition of a derived clause, external encoding.
    pub fn add_derived_clause(&mut self, clause: &[i32]) {
        self.added += 1;
        let r = self.emit(b'a', clause);
        self.note(r);
    }

    /// Emit the deletion of a clause that became unreachable.
    pub fn delete_clause(&mut self, clause: &[i32]) {
        self.deleted += 1;
        let r = self.emit(b'd', clause);
        self.note(r);
    }

    /// Emit a derived unit.
    pub fn add_derived_unit(&mut self, unit: i32) {
        self.add_derived_clause(&[unit]);
    }

    /// Emit the empty clause, terminating a refutation.
    pub fn add_empty_clause(&mut self) {
        self.add_derived_clause(&[]);
    }

    pub fn flush(&mut self) {
        let r = self.out.flush();
        self.note(r);
    }

    /// Flush and report whether the whole trace was written successfully.
    pub fn close(mut self) -> io::Result<()> {
        self.out.flush()?;
        if self.broken {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "proof trace is broken (earlier write failed)",
            ))
        } else {
            Ok(())
        }
    }

    fn note(&mut self, r: io::Result<()>) {
        if r.is_err() {
            self.broken = true;
        }
    }

    fn emit(&mut self, tag: u8, clause: &[i32]) -> io::Result<()> {
        if self.broken {
            return Ok(()); // already broken, stay quiet until close
        }
        match self.format {
            ProofFormat::Ascii => {
                if tag == b'd' {
                    self.out.write_all(b"d ")?;
                }
                for &lit in clause {
                    write!(self.out, "{} ", lit)?;
                }
                self.out.write_all(b"0\n")
            }
            ProofFormat::Binary => {
                self.out.write_all(&[tag])?;
                for &lit in clause {
                    let enc: u64 = if lit > 0 {
                        2 * lit as u64
                    } else {
                        2 * (-(lit as i64)) as u64 + 1
                    };
                    write_varint(&mut self.out, enc)?;
                }
                self.out.write_all(&[0])
            }
        }
    }
}

/// Variable length encoding used by the binary DRAT format: 7 value bits per
/// byte, high bit marks continuation.
fn write_varint<W: Write>(out: &mut W, mut x: u64) -> io::Result<()> {
    loop {
        let byte = (x & 0x7f) as u8;
        x >>= 7;
        if x != 0 {
            out.write_all(&[byte | 0x80])?;
        } else {
            return out.write_all(&[byte]);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct Sink(Rc<RefCell<Vec<u8>>>);
    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ascii_lines() {
        let buf = Rc::new(RefCell::new(vec![]));
        let mut p = Proof::from_writer(Box::new(Sink(buf.clone())), ProofFormat::Ascii);
        p.add_derived_clause(&[1, -2]);
        p.delete_clause(&[3]);
        p.add_empty_clause();
        p.flush();
        let s = String::from_utf8(buf.borrow().clone()).unwrap();
        assert_eq!(s, "1 -2 0\nd 3 0\n0\n");
    }

    #[test]
    fn test_binary_encoding() {
        let buf = Rc::new(RefCell::new(vec![]));
        let mut p = Proof::from_writer(Box::new(Sink(buf.clone())), ProofFormat::Binary);
        p.add_derived_clause(&[1, -2]);
        p.flush();
        // 'a', 2*1, 2*2+1, 0
        assert_eq!(&*buf.borrow(), &[b'a', 2, 5, 0]);
    }

    #[test]
    fn test_binary_varint_large() {
        let buf = Rc::new(RefCell::new(vec![]));
        let mut p = Proof::from_writer(Box::new(Sink(buf.clone())), ProofFormat::Binary);
        p.add_derived_clause(&[64]);
        p.flush();
        // 2*64 = 128 -> 0x80 0x01
        assert_eq!(&*buf.borrow(), &[b'a', 0x80, 0x01, 0]);
    }

    struct Failing;
    impl Write for Failing {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "nope"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_sink_surfaces_at_close() {
        let mut p = Proof::from_writer(Box::new(Failing), ProofFormat::Ascii);
        p.add_derived_clause(&[1]);
        assert!(p.broken());
        // further emissions do not panic
        p.add_derived_clause(&[2]);
        assert!(p.close().is_err());
    }
}
