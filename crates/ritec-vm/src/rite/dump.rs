// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Serializes an irep tree.

use super::*;
use crate::compiler::{Irep, PoolValue};
use crate::error::DumpError;

/// Serializes `irep` and its children into a RITE binary.
pub fn dump_irep(irep: &Irep, flags: DumpFlags) -> Result<Vec<u8>, DumpError> {
    let mut out = Vec::with_capacity(HEADER_SIZE + irep.iseq.len() * 2);
    out.extend_from_slice(RITE_IDENT);
    out.extend_from_slice(RITE_MAJOR);
    out.extend_from_slice(RITE_MINOR);
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(COMPILER_NAME);
    out.extend_from_slice(COMPILER_VERSION);

    let start = begin_section(&mut out, SECTION_IREP);
    out.extend_from_slice(IREP_VERSION);
    write_irep_record(&mut out, irep)?;
    end_section(&mut out, start)?;

    if flags.debug_info {
        let start = begin_section(&mut out, SECTION_DEBUG);
        write_debug_record(&mut out, irep)?;
        end_section(&mut out, start)?;
    }

    let start = begin_section(&mut out, SECTION_END);
    end_section(&mut out, start)?;

    let total = u32_len(out.len(), "binary size")?;
    out[8..12].copy_from_slice(&total.to_be_bytes());
    Ok(out)
}

fn begin_section(out: &mut Vec<u8>, ident: &[u8; 4]) -> usize {
    let start = out.len();
    out.extend_from_slice(ident);
    out.extend_from_slice(&[0; 4]);
    start
}

fn end_section(out: &mut [u8], start: usize) -> Result<(), DumpError> {
    let size = u32_len(out.len() - start, "section size")?;
    out[start + 4..start + 8].copy_from_slice(&size.to_be_bytes());
    Ok(())
}

fn write_irep_record(out: &mut Vec<u8>, irep: &Irep) -> Result<(), DumpError> {
    let start = out.len();
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&irep.nlocals.to_be_bytes());
    out.extend_from_slice(&irep.nregs.to_be_bytes());
    out.extend_from_slice(&u16_len(irep.reps.len(), "child irep")?.to_be_bytes());
    // catch handler table, always empty
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&u32_len(irep.iseq.len(), "instruction")?.to_be_bytes());
    out.extend_from_slice(&irep.iseq);

    out.extend_from_slice(&u16_len(irep.pool.len(), "pool")?.to_be_bytes());
    for value in &irep.pool {
        match value {
            PoolValue::Str(s) => {
                out.push(POOL_STR);
                write_string(out, s, "string literal")?;
            }
            PoolValue::Int(n) => match i32::try_from(*n) {
                Ok(small) => {
                    out.push(POOL_INT32);
                    out.extend_from_slice(&small.to_be_bytes());
                }
                Err(_) => {
                    out.push(POOL_INT64);
                    out.extend_from_slice(&n.to_be_bytes());
                }
            },
            PoolValue::Float(f) => {
                out.push(POOL_FLOAT);
                out.extend_from_slice(&f.to_be_bytes());
            }
        }
    }

    out.extend_from_slice(&u16_len(irep.syms.len(), "symbol")?.to_be_bytes());
    for sym in &irep.syms {
        write_string(out, sym, "symbol name")?;
    }

    let size = u32_len(out.len() - start, "record size")?;
    out[start..start + 4].copy_from_slice(&size.to_be_bytes());

    for rep in &irep.reps {
        write_irep_record(out, rep)?;
    }
    Ok(())
}

fn write_debug_record(out: &mut Vec<u8>, irep: &Irep) -> Result<(), DumpError> {
    let debug = irep.debug.as_ref();
    match debug.and_then(|d| d.filename.as_deref()) {
        Some(filename) => {
            out.push(1);
            write_string(out, filename, "filename")?;
        }
        None => out.push(0),
    }

    let lines = debug.map(|d| d.lines.as_slice()).unwrap_or_default();
    out.extend_from_slice(&u32_len(lines.len(), "line entry")?.to_be_bytes());
    for entry in lines {
        out.extend_from_slice(&entry.pc.to_be_bytes());
        out.extend_from_slice(&entry.line.to_be_bytes());
    }

    for rep in &irep.reps {
        write_debug_record(out, rep)?;
    }
    Ok(())
}

/// Writes a `u16` length, the bytes and a trailing NUL.
fn write_string(out: &mut Vec<u8>, s: &str, what: &'static str) -> Result<(), DumpError> {
    out.extend_from_slice(&u16_len(s.len(), what)?.to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

fn u16_len(count: usize, what: &'static str) -> Result<u16, DumpError> {
    u16::try_from(count).map_err(|_| DumpError::TooLarge { what, count })
}

fn u32_len(count: usize, what: &'static str) -> Result<u32, DumpError> {
    u32::try_from(count).map_err(|_| DumpError::TooLarge { what, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let irep = Irep {
            iseq: vec![1, 36],
            nregs: 1,
            ..Default::default()
        };
        let bin = dump_irep(&irep, DumpFlags::NONE).unwrap();
        assert_eq!(&bin[0..4], b"RITE");
        assert_eq!(&bin[4..8], b"0300");
        assert_eq!(u32::from_be_bytes(bin[8..12].try_into().unwrap()) as usize, bin.len());
        assert_eq!(&bin[12..20], b"RTEC0000");
        assert_eq!(&bin[20..24], b"IREP");
        assert_eq!(&bin[bin.len() - 8..bin.len() - 4], b"END\0");
    }

    #[test]
    fn test_pool_tags() {
        let irep = Irep {
            pool: vec![
                PoolValue::Str("hi".into()),
                PoolValue::Int(70000),
                PoolValue::Int(1 << 40),
                PoolValue::Float(1.5),
            ],
            ..Default::default()
        };
        let bin = dump_irep(&irep, DumpFlags::NONE).unwrap();
        // header + section header + version + fixed record fields
        let pool = HEADER_SIZE + SECTION_HEADER_SIZE + 4 + 16;
        assert_eq!(&bin[pool..pool + 2], &4u16.to_be_bytes());
        assert_eq!(bin[pool + 2], POOL_STR);
        assert_eq!(&bin[pool + 3..pool + 8], &[0, 2, b'h', b'i', 0]);
        assert_eq!(bin[pool + 8], POOL_INT32);
        assert_eq!(bin[pool + 13], POOL_INT64);
        assert_eq!(bin[pool + 22], POOL_FLOAT);
    }
}
