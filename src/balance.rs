//! Balance lookup backends over the reference address table.
//!
//! The table is a text file of `address<TAB>balance` records. It is either
//! loaded whole into a hash index, or binary-searched on disk when it is
//! too large to hold in memory. Workers own their index handle: the file
//! backend seeks a stateful reader, so handles are never shared.

use fxhash::FxHashMap;
use log::warn;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Polymorphic "does this address have a known balance" query.
///
/// Takes `&mut self` because the sorted-file backend seeks its reader.
pub trait AddressIndex: Send {
    fn lookup(&mut self, address: &str) -> io::Result<Option<u64>>;
}

/// Splits an `address<TAB>balance[<CR>]` record. `None` when the tab is
/// missing or the balance is not a number. Zero padding around the balance
/// is accepted and removed.
fn parse_record(line: &str) -> Option<(&str, u64)> {
    let (address, balance) = line.split_once('\t')?;
    let balance = balance.trim().parse().ok()?;
    Some((address, balance))
}

/// The address field of a record, for probe comparisons.
fn address_field(line: &str) -> &str {
    match line.split_once('\t') {
        Some((address, _)) => address,
        None => line.trim_end_matches('\r'),
    }
}

/// Balance of a record that matched the probed address. Malformed records
/// are reported and treated as absent.
fn record_balance(line: &str) -> Option<u64> {
    match parse_record(line) {
        Some((_, balance)) => Some(balance),
        None => {
            warn!("malformed record in sorted balance file: {line:?}");
            None
        }
    }
}

/// Whole-table hash index, built once at startup.
pub struct MemoryIndex {
    balances: FxHashMap<Box<str>, u64>,
}

impl MemoryIndex {
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Scans the table line by line. Only addresses in the P2PKH range
    /// (`1...`, `3...`) are admitted; records that fail to parse are
    /// dropped without aborting the load.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut balances = FxHashMap::default();
        for line in reader.lines() {
            let line = line?;
            let Some((address, balance)) = parse_record(&line) else {
                continue;
            };
            if !(address.starts_with('1') || address.starts_with('3')) {
                continue;
            }
            balances.insert(address.into(), balance);
        }
        Ok(Self { balances })
    }

    pub fn get(&self, address: &str) -> Option<u64> {
        self.balances.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl AddressIndex for Arc<MemoryIndex> {
    fn lookup(&mut self, address: &str) -> io::Result<Option<u64>> {
        Ok(self.get(address))
    }
}

/// Line layout assumptions for [`SortedFileIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Every line occupies the same number of bytes, terminator included.
    /// Probes seek straight to line boundaries.
    FixedWidth,
    /// Lines may differ in length. Probes scan backward to the preceding
    /// newline before reading.
    VariableWidth,
}

enum Stride {
    Fixed(u64),
    Variable,
}

/// Binary search over a balance file kept on disk, sorted ascending by
/// address (byte order). Trades memory for seek latency.
pub struct SortedFileIndex<S> {
    src: BufReader<S>,
    size: u64,
    stride: Stride,
    #[cfg(test)]
    line_reads: u64,
}

impl SortedFileIndex<File> {
    pub fn open(path: impl AsRef<Path>, layout: Layout) -> io::Result<Self> {
        Self::new(File::open(path)?, layout)
    }
}

impl<S: Read + Seek> SortedFileIndex<S> {
    /// In fixed-width mode the line width is taken from the first line and
    /// the file size must be a whole number of lines.
    pub fn new(src: S, layout: Layout) -> io::Result<Self> {
        let mut src = BufReader::new(src);
        let size = src.seek(SeekFrom::End(0))?;
        let mut index = Self {
            src,
            size,
            stride: Stride::Variable,
            #[cfg(test)]
            line_reads: 0,
        };
        // an empty file answers every query with None under either layout
        if layout == Layout::FixedWidth && size > 0 {
            let (_, width) = index.read_line_at(0)?;
            if size % width != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file size {size} is not a multiple of the line width {width}"),
                ));
            }
            index.stride = Stride::Fixed(width);
        }
        Ok(index)
    }

    pub fn lookup(&mut self, address: &str) -> io::Result<Option<u64>> {
        if self.size == 0 {
            return Ok(None);
        }
        match self.stride {
            Stride::Fixed(width) => self.lookup_fixed(address, width),
            Stride::Variable => self.lookup_variable(address),
        }
    }

    fn lookup_fixed(&mut self, address: &str, width: u64) -> io::Result<Option<u64>> {
        let width = width as i64;
        let mut lo = 0_i64;
        let mut hi = self.size as i64 - width;
        while lo <= hi {
            // midpoint rounded down to a line boundary
            let mid = (lo + hi) / 2 / width * width;
            let (line, _) = self.read_line_at(mid as u64)?;
            match address_field(&line).cmp(address) {
                Ordering::Equal => return Ok(record_balance(&line)),
                Ordering::Less => lo = mid + width,
                Ordering::Greater => hi = mid - width,
            }
        }
        Ok(None)
    }

    fn lookup_variable(&mut self, address: &str) -> io::Result<Option<u64>> {
        let mut lo = 0_u64;
        let mut hi = self.size;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let line_start = self.line_start_before(mid)?;
            let (line, next) = self.read_line_at(line_start)?;
            match address_field(&line).cmp(address) {
                Ordering::Equal => return Ok(record_balance(&line)),
                Ordering::Less => lo = next,
                Ordering::Greater => hi = line_start,
            }
        }
        Ok(None)
    }

    /// An arbitrary probe offset can land mid-line; walk back to the first
    /// byte after the preceding newline.
    fn line_start_before(&mut self, offset: u64) -> io::Result<u64> {
        let mut pos = offset;
        let mut byte = [0_u8; 1];
        while pos > 0 {
            self.src.seek(SeekFrom::Start(pos - 1))?;
            self.src.read_exact(&mut byte)?;
            if byte[0] == b'\n' {
                break;
            }
            pos -= 1;
        }
        Ok(pos)
    }

    /// Reads the line starting at `offset`. Returns it without the newline,
    /// together with the offset just past it.
    fn read_line_at(&mut self, offset: u64) -> io::Result<(String, u64)> {
        self.src.seek(SeekFrom::Start(offset))?;
        let mut raw = Vec::new();
        self.src.read_until(b'\n', &mut raw)?;
        #[cfg(test)]
        {
            self.line_reads += 1;
        }
        let next = offset + raw.len() as u64;
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        let line = String::from_utf8(raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((line, next))
    }

    #[cfg(test)]
    fn take_line_reads(&mut self) -> u64 {
        std::mem::take(&mut self.line_reads)
    }
}

impl<S: Read + Seek + Send> AddressIndex for SortedFileIndex<S> {
    fn lookup(&mut self, address: &str) -> io::Result<Option<u64>> {
        SortedFileIndex::lookup(self, address)
    }
}
