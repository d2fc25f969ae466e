// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Reads an irep tree back from a RITE binary.

use std::rc::Rc;

use super::*;
use crate::compiler::{DebugInfo, Irep, LineEntry, PoolValue};
use crate::error::RiteError;
use crate::parser::MAX_NESTING;

/// Parses a RITE binary into its top-level irep.
///
/// Sections after `END\0` are ignored, as are unknown sections.
pub fn load_irep(bin: &[u8]) -> Result<Irep, RiteError> {
    if bin.len() < HEADER_SIZE {
        return Err(RiteError::TooShort);
    }
    if &bin[0..4] != RITE_IDENT {
        return Err(RiteError::BadIdentifier);
    }
    let major = &bin[4..6];
    let minor = &bin[6..8];
    if major != RITE_MAJOR || minor > RITE_MINOR.as_slice() {
        return Err(RiteError::IncompatibleVersion {
            major: String::from_utf8_lossy(major).into_owned(),
            minor: String::from_utf8_lossy(minor).into_owned(),
        });
    }
    let declared = u32::from_be_bytes([bin[8], bin[9], bin[10], bin[11]]) as usize;
    if declared > bin.len() {
        return Err(RiteError::TooShort);
    }

    let mut irep = None;
    let mut offset = HEADER_SIZE;
    while offset < declared {
        let mut reader = Reader::new(&bin[..declared], offset);
        let ident = reader.bytes(4)?;
        let size = reader.u32()? as usize;
        if size < SECTION_HEADER_SIZE || offset + size > declared {
            return Err(RiteError::TooShort);
        }

        if ident == SECTION_IREP {
            reader.bytes(4)?;
            irep = Some(read_irep_record(&mut reader, 0)?);
        } else if ident == SECTION_DEBUG {
            if let Some(irep) = irep.as_mut() {
                read_debug_record(&mut reader, irep)?;
            }
        } else if ident == SECTION_END {
            break;
        }
        offset += size;
    }

    irep.ok_or(RiteError::MissingIrep)
}

fn read_irep_record(reader: &mut Reader<'_>, depth: usize) -> Result<Irep, RiteError> {
    if depth > MAX_NESTING {
        return Err(RiteError::TooDeep);
    }
    reader.u32()?;
    let nlocals = reader.u16()?;
    let nregs = reader.u16()?;
    let rlen = reader.u16()?;
    let clen = reader.u16()?;
    let ilen = reader.u32()? as usize;
    let iseq = reader.bytes(ilen)?.to_vec();
    // catch handlers are never emitted; skip their fixed-size entries
    reader.bytes(usize::from(clen) * 13)?;

    let plen = reader.u16()?;
    let mut pool = Vec::with_capacity(usize::from(plen));
    for _ in 0..plen {
        let value = match reader.u8()? {
            POOL_STR => PoolValue::Str(reader.string("string literal")?),
            POOL_INT32 => PoolValue::Int(i64::from(i32::from_be_bytes(reader.array()?))),
            POOL_INT64 => PoolValue::Int(i64::from_be_bytes(reader.array()?)),
            POOL_FLOAT => PoolValue::Float(f64::from_be_bytes(reader.array()?)),
            tag => return Err(RiteError::UnknownPoolType(tag)),
        };
        pool.push(value);
    }

    let slen = reader.u16()?;
    let mut syms = Vec::with_capacity(usize::from(slen));
    for _ in 0..slen {
        syms.push(reader.string("symbol name")?);
    }

    let mut reps = Vec::with_capacity(usize::from(rlen));
    for _ in 0..rlen {
        reps.push(Rc::new(read_irep_record(reader, depth + 1)?));
    }

    Ok(Irep {
        nlocals,
        nregs,
        iseq,
        pool,
        syms,
        reps,
        debug: None,
    })
}

fn read_debug_record(reader: &mut Reader<'_>, irep: &mut Irep) -> Result<(), RiteError> {
    let filename = match reader.u8()? {
        0 => None,
        _ => Some(reader.string("filename")?),
    };
    let count = reader.u32()? as usize;
    let mut lines = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        let pc = reader.u32()?;
        let line = reader.u32()?;
        lines.push(LineEntry { pc, line });
    }
    irep.debug = Some(DebugInfo { filename, lines });

    for rep in &mut irep.reps {
        read_debug_record(reader, Rc::make_mut(rep))?;
    }
    Ok(())
}

/// Bounds-checked big-endian cursor.
struct Reader<'a> {
    bin: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bin: &'a [u8], pos: usize) -> Self {
        Self { bin, pos }
    }

    fn remaining(&self) -> usize {
        self.bin.len().saturating_sub(self.pos)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], RiteError> {
        let end = self.pos.checked_add(len).ok_or(RiteError::TooShort)?;
        let slice = self.bin.get(self.pos..end).ok_or(RiteError::TooShort)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RiteError> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.bytes(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, RiteError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, RiteError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, RiteError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Reads a `u16` length, the bytes and the trailing NUL.
    fn string(&mut self, what: &'static str) -> Result<String, RiteError> {
        let len = usize::from(self.u16()?);
        let bytes = self.bytes(len)?;
        self.bytes(1)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| RiteError::InvalidUtf8(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rite::dump_irep;

    fn sample() -> Vec<u8> {
        let irep = Irep {
            nregs: 1,
            iseq: vec![1, 36],
            ..Default::default()
        };
        dump_irep(&irep, DumpFlags::NONE).unwrap()
    }

    #[test]
    fn test_too_short() {
        assert_eq!(load_irep(b"RITE03"), Err(RiteError::TooShort));
    }

    #[test]
    fn test_bad_identifier() {
        let mut bin = sample();
        bin[0] = b'X';
        assert_eq!(load_irep(&bin), Err(RiteError::BadIdentifier));
    }

    #[test]
    fn test_major_version_mismatch() {
        let mut bin = sample();
        bin[4..6].copy_from_slice(b"02");
        assert!(matches!(
            load_irep(&bin),
            Err(RiteError::IncompatibleVersion { major, .. }) if major == "02"
        ));
    }

    #[test]
    fn test_newer_minor_version_is_rejected() {
        let mut bin = sample();
        bin[6..8].copy_from_slice(b"01");
        assert!(matches!(
            load_irep(&bin),
            Err(RiteError::IncompatibleVersion { minor, .. }) if minor == "01"
        ));
    }

    #[test]
    fn test_truncated_binary() {
        let bin = sample();
        let cut = &bin[..bin.len() - 10];
        assert_eq!(load_irep(cut), Err(RiteError::TooShort));
    }

    #[test]
    fn test_unknown_pool_type() {
        let irep = Irep {
            pool: vec![PoolValue::Float(2.0)],
            ..Default::default()
        };
        let mut bin = dump_irep(&irep, DumpFlags::NONE).unwrap();
        let tag = HEADER_SIZE + SECTION_HEADER_SIZE + 4 + 16 + 2;
        bin[tag] = 9;
        assert_eq!(load_irep(&bin), Err(RiteError::UnknownPoolType(9)));
    }

    #[test]
    fn test_missing_irep_section() {
        let mut bin = Vec::new();
        bin.extend_from_slice(b"RITE0300");
        bin.extend_from_slice(&28u32.to_be_bytes());
        bin.extend_from_slice(b"RTEC0000");
        bin.extend_from_slice(b"END\0");
        bin.extend_from_slice(&8u32.to_be_bytes());
        assert_eq!(load_irep(&bin), Err(RiteError::MissingIrep));
    }

    #[test]
    fn test_nesting_limit() {
        let nest = |levels: usize| {
            let mut irep = Irep::default();
            for _ in 0..levels {
                irep = Irep {
                    reps: vec![Rc::new(irep)],
                    ..Default::default()
                };
            }
            dump_irep(&irep, DumpFlags::NONE).unwrap()
        };
        assert!(load_irep(&nest(MAX_NESTING)).is_ok());
        assert_eq!(load_irep(&nest(MAX_NESTING + 1)), Err(RiteError::TooDeep));
    }
}
