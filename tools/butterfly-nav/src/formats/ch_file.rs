//! `<name>.ch` format - cached contraction hierarchy
//!
//! Little-endian layout:
//! - header (28 bytes): magic, version, reserved, n_nodes, n_fwd_arcs, n_bwd_arcs
//! - rank array (`n_nodes` x u32)
//! - forward CSR: offsets (`n_nodes + 1` x u64), heads, weights, middles (u32 each)
//! - backward CSR, same layout
//! - footer: CRC-64 (GO-ISO) of everything above
//!
//! Decoding rejects offsets that decrease and node ids (heads, middles,
//! ranks) outside `0..n_nodes`, so a loaded hierarchy is always safe to
//! query.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crc::{Crc, Digest, CRC_64_GO_ISO};

use super::FormatError;
use crate::ch::{ContractionHierarchy, UpwardCsr, NO_MIDDLE};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

const MAGIC: u32 = 0x4E564348; // "NVCH"
const VERSION: u16 = 1;
const HEADER_LEN: usize = 28;

/// Writer that feeds every byte into a CRC digest
struct HashingWriter<W: Write> {
    inner: W,
    digest: Digest<'static, u64>,
}

impl<W: Write> HashingWriter<W> {
    fn put(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes)?;
        self.digest.update(bytes);
        Ok(())
    }

    fn put_u32s(&mut self, values: &[u32]) -> std::io::Result<()> {
        for v in values {
            self.put(&v.to_le_bytes())?;
        }
        Ok(())
    }

    fn put_csr(&mut self, csr: &UpwardCsr) -> std::io::Result<()> {
        for off in &csr.offsets {
            self.put(&off.to_le_bytes())?;
        }
        self.put_u32s(&csr.heads)?;
        self.put_u32s(&csr.weights)?;
        self.put_u32s(&csr.middles)
    }
}

/// Bounds-checked little-endian reader over the file body
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(FormatError::Malformed {
                token: self.pos,
                message: format!("truncated file: need {} more bytes", len),
            }),
        }
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, FormatError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    fn u32s(&mut self, count: usize) -> Result<Vec<u32>, FormatError> {
        (0..count).map(|_| self.u32()).collect()
    }

    /// `count` node ids, each below `n_nodes` (or `NO_MIDDLE` when allowed)
    fn node_ids(
        &mut self,
        count: usize,
        n_nodes: u32,
        allow_none: bool,
    ) -> Result<Vec<u32>, FormatError> {
        let start = self.pos;
        let ids = self.u32s(count)?;
        if let Some(i) = ids
            .iter()
            .position(|&id| id >= n_nodes && !(allow_none && id == NO_MIDDLE))
        {
            return Err(FormatError::Malformed {
                token: start + 4 * i,
                message: format!("node id {} out of range for {} nodes", ids[i], n_nodes),
            });
        }
        Ok(ids)
    }

    fn csr(&mut self, n_nodes: u32, n_arcs: u64) -> Result<UpwardCsr, FormatError> {
        let start = self.pos;
        let offsets = (0..=n_nodes).map(|_| self.u64()).collect::<Result<Vec<_>, _>>()?;
        if offsets.first() != Some(&0) || offsets.last() != Some(&n_arcs) {
            return Err(FormatError::Malformed {
                token: start,
                message: "CSR offsets do not span the arc count".to_string(),
            });
        }
        if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(FormatError::Malformed {
                token: start + 8 * (i + 1),
                message: format!("CSR offsets decrease after node {}", i),
            });
        }

        let n = usize::try_from(n_arcs).map_err(|_| FormatError::Malformed {
            token: start,
            message: format!("arc count {} does not fit in memory", n_arcs),
        })?;
        Ok(UpwardCsr {
            offsets,
            heads: self.node_ids(n, n_nodes, false)?,
            weights: self.u32s(n)?,
            middles: self.node_ids(n, n_nodes, true)?,
        })
    }
}

pub struct ChFile;

impl ChFile {
    pub fn write<P: AsRef<Path>>(path: P, ch: &ContractionHierarchy) -> Result<(), FormatError> {
        let mut writer = HashingWriter {
            inner: BufWriter::new(File::create(path)?),
            digest: CRC64.digest(),
        };

        // Header
        writer.put(&MAGIC.to_le_bytes())?;
        writer.put(&VERSION.to_le_bytes())?;
        writer.put(&0u16.to_le_bytes())?;
        writer.put(&ch.n_nodes.to_le_bytes())?;
        writer.put(&(ch.fwd.n_arcs() as u64).to_le_bytes())?;
        writer.put(&(ch.bwd.n_arcs() as u64).to_le_bytes())?;

        writer.put_u32s(&ch.rank)?;
        writer.put_csr(&ch.fwd)?;
        writer.put_csr(&ch.bwd)?;

        // Footer
        let HashingWriter { mut inner, digest } = writer;
        inner.write_all(&digest.finalize().to_le_bytes())?;
        inner.flush()?;

        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<ContractionHierarchy, FormatError> {
        let data = fs::read(path)?;
        if data.len() < HEADER_LEN + 8 {
            return Err(FormatError::Malformed {
                token: data.len(),
                message: "file shorter than header and footer".to_string(),
            });
        }

        let (body, footer) = data.split_at(data.len() - 8);
        let mut cursor = Cursor { data: body, pos: 0 };

        let magic = cursor.u32()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let version = cursor.u16()?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion {
                expected: VERSION,
                found: version,
            });
        }

        let mut stored = [0u8; 8];
        stored.copy_from_slice(footer);
        let stored = u64::from_le_bytes(stored);
        let computed = CRC64.checksum(body);
        if stored != computed {
            return Err(FormatError::ChecksumMismatch { stored, computed });
        }

        let _reserved = cursor.u16()?;
        let n_nodes = cursor.u32()?;
        let n_fwd = cursor.u64()?;
        let n_bwd = cursor.u64()?;

        let rank = cursor.node_ids(n_nodes as usize, n_nodes, false)?;
        let fwd = cursor.csr(n_nodes, n_fwd)?;
        let bwd = cursor.csr(n_nodes, n_bwd)?;

        if cursor.pos != body.len() {
            return Err(FormatError::Malformed {
                token: cursor.pos,
                message: "trailing bytes before footer".to_string(),
            });
        }

        Ok(ContractionHierarchy {
            n_nodes,
            rank,
            fwd,
            bwd,
        })
    }
}
