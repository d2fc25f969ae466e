// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The RITE binary format.
//!
//! A binary is a 20-byte header followed by sections. Each section starts
//! with a four byte identifier and a big-endian `u32` size that covers the
//! section header itself.
//!
//! ```text
//! +------+----+----+--------+------+------+
//! | RITE | 03 | 00 | size:4 | RTEC | 0000 |   header
//! +------+----+----+--------+------+------+
//! | IREP | size:4 | 0300 | records...     |   irep tree, depth first
//! | DBG\0| size:4 | per-irep line tables  |   optional
//! | END\0| size:4                         |
//! +------------------------------------------+
//! ```

mod dump;
mod load;

pub use dump::dump_irep;
pub use load::load_irep;

/// Binary identifier.
pub const RITE_IDENT: &[u8; 4] = b"RITE";
/// Major format version; readers reject any other value.
pub const RITE_MAJOR: &[u8; 2] = b"03";
/// Minor format version; readers accept this or older.
pub const RITE_MINOR: &[u8; 2] = b"00";
/// Compiler name recorded in the header.
pub const COMPILER_NAME: &[u8; 4] = b"RTEC";
/// Compiler version recorded in the header.
pub const COMPILER_VERSION: &[u8; 4] = b"0000";

pub(crate) const HEADER_SIZE: usize = 20;
pub(crate) const SECTION_HEADER_SIZE: usize = 8;

pub(crate) const SECTION_IREP: &[u8; 4] = b"IREP";
pub(crate) const SECTION_DEBUG: &[u8; 4] = b"DBG\0";
pub(crate) const SECTION_END: &[u8; 4] = b"END\0";
pub(crate) const IREP_VERSION: &[u8; 4] = b"0300";

pub(crate) const POOL_STR: u8 = 0;
pub(crate) const POOL_INT32: u8 = 1;
pub(crate) const POOL_INT64: u8 = 3;
pub(crate) const POOL_FLOAT: u8 = 5;

/// Options controlling what a dump contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpFlags {
    /// Emit the `DBG\0` section with filenames and line tables
    pub debug_info: bool,
}

impl DumpFlags {
    /// Flags for a binary without debug info.
    pub const NONE: DumpFlags = DumpFlags { debug_info: false };

    /// Flags for a binary carrying debug info.
    pub const DEBUG_INFO: DumpFlags = DumpFlags { debug_info: true };
}
