use std::{
    fmt::Display,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, hex_digit1, multispace0},
    combinator::{map_res, opt},
    number::complete::be_u8,
    sequence::preceded,
    IResult,
};
use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::addr::Addr;

/// marks the end of a trace; anything after it is ignored.
pub const EOF_MARKER: &str = "#eof";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessKind {
    Read = b'R',
    Write = b'W',
}

impl Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u8 as char)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub kind: AccessKind,
    pub addr: Addr,
}

impl Access {
    pub fn read(addr: u64) -> Self {
        Self {
            kind: AccessKind::Read,
            addr: Addr::new(addr),
        }
    }
    pub fn write(addr: u64) -> Self {
        Self {
            kind: AccessKind::Write,
            addr: Addr::new(addr),
        }
    }
}

impl Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.addr)
    }
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("cannot open trace file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read trace at line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
}

/// one line of a trace, classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceLine {
    Access(Access),
    Eof,
    Malformed,
}

fn hex_u64(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, _) = multispace0(input)?;
    preceded(
        opt(alt((tag(&b"0x"[..]), tag(&b"0X"[..])))),
        map_res(map_res(hex_digit1, std::str::from_utf8), |s: &str| {
            u64::from_str_radix(s, 16)
        }),
    )(input)
}

/// `<pc>: <op> <address>`; bytes after the address are ignored.
fn record(input: &[u8]) -> IResult<&[u8], (u64, u8, u64)> {
    let (input, pc) = hex_u64(input)?;
    let (input, _) = char(':')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = be_u8(input)?;
    let (input, addr) = hex_u64(input)?;
    Ok((input, (pc, op, addr)))
}

impl TraceLine {
    /// classifies a raw line. only the bytes up to the address have to be valid.
    pub fn parse(line: impl AsRef<[u8]>) -> Self {
        let line = line.as_ref();
        if line.starts_with(EOF_MARKER.as_bytes()) {
            return TraceLine::Eof;
        }
        let Ok((_, (_pc, op, addr))) = record(line) else {
            return TraceLine::Malformed;
        };
        match AccessKind::try_from_primitive(op) {
            Ok(kind) => TraceLine::Access(Access {
                kind,
                addr: Addr::new(addr),
            }),
            Err(_) => TraceLine::Malformed,
        }
    }
}

/// yields the accesses of a trace, skipping malformed lines and stopping at [`EOF_MARKER`].
pub struct TraceReader<R> {
    inner: R,
    buf: Vec<u8>,
    line: usize,
    records: usize,
    skipped: usize,
    finished: bool,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("reading trace from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            line: 0,
            records: 0,
            skipped: 0,
            finished: false,
        }
    }
    /// number of accesses yielded so far
    pub fn records(&self) -> usize {
        self.records
    }
    /// number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Access, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                }
                Ok(_) => {
                    self.line += 1;
                    match TraceLine::parse(&self.buf) {
                        TraceLine::Access(a) => {
                            self.records += 1;
                            return Some(Ok(a));
                        }
                        TraceLine::Eof => {
                            log::info!("end-of-trace marker at line {}", self.line);
                            self.finished = true;
                        }
                        TraceLine::Malformed => {
                            log::debug!(
                                "skipping malformed line {}: {:?}",
                                self.line,
                                String::from_utf8_lossy(&self.buf).trim_end()
                            );
                            self.skipped += 1;
                        }
                    }
                }
                Err(source) => {
                    self.finished = true;
                    return Some(Err(TraceError::Read {
                        line: self.line + 1,
                        source,
                    }));
                }
            }
        }
        None
    }
}
