// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    headers::encodings::{read_bool, U32Coder, U32},
    util::tracing_wrappers::*,
};

/// Byte ranges of the sections of a frame, in bitstream order: DC-global,
/// DC-groups (row-major), AC-global, then AC-groups pass-major.
#[derive(Debug, PartialEq, Eq)]
pub struct Toc {
    pub offsets: Vec<u64>,
    pub sizes: Vec<u32>,
    pub total_size: u64,
}

fn entry_coder() -> U32Coder {
    U32Coder::Select(
        U32::Bits(10),
        U32::BitsOffset { n: 14, off: 1024 },
        U32::BitsOffset { n: 22, off: 17408 },
        U32::BitsOffset {
            n: 30,
            off: 4211712,
        },
    )
}

/// The first section byte offset plus the total of the section sizes must
/// not wrap.
pub fn check_group_codes(group_codes_begin: u64, groups_total_size: u64) -> Result<()> {
    if group_codes_begin.checked_add(groups_total_size).is_none() {
        return Err(Error::InvalidGroupCodes);
    }
    Ok(())
}

/// Parses the size table into cumulative offsets; the reader is left at the
/// byte boundary where the first section starts.
pub fn read_toc(br: &mut BitReader, num_entries: usize) -> Result<Toc> {
    debug_assert!(num_entries > 0);
    if read_bool(br)? {
        // Permutation decoding needs the entropy seam; this codec profile
        // stores sections in natural order.
        return Err(Error::PermutedTocUnsupported);
    }
    br.jump_to_byte_boundary()?;
    let mut offsets = Vec::with_capacity(num_entries);
    let mut sizes = Vec::with_capacity(num_entries);
    let mut total_size: u64 = 0;
    for _ in 0..num_entries {
        let size = entry_coder().read(br)?;
        offsets.push(total_size);
        sizes.push(size);
        total_size = total_size
            .checked_add(size as u64)
            .ok_or(Error::InvalidGroupCodes)?;
    }
    br.jump_to_byte_boundary()?;
    trace!(?offsets, ?sizes, total_size);
    Ok(Toc {
        offsets,
        sizes,
        total_size,
    })
}
