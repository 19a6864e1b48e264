// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

pub enum U32 {
    Bits(usize),
    BitsOffset { n: usize, off: u32 },
    Val(u32),
}

pub enum U32Coder {
    Direct(U32),
    Select(U32, U32, U32, U32),
}

impl U32 {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match self {
            &U32::Bits(n) => Ok(br.read(n)? as u32),
            &U32::BitsOffset { n, off } => Ok(br.read(n)? as u32 + off),
            &U32::Val(val) => Ok(val),
        }
    }
}

impl U32Coder {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match self {
            U32Coder::Direct(u) => u.read(br),
            U32Coder::Select(u0, u1, u2, u3) => {
                let selector = br.read(2)?;
                match selector {
                    0 => u0.read(br),
                    1 => u1.read(br),
                    2 => u2.read(br),
                    3 => u3.read(br),
                    _ => unreachable!("two bits read as {selector}"),
                }
            }
        }
    }
}

/// Variable-length u64: 2-bit selector, then 0 / 4+1 / 8+17 bits, or a
/// 12-bit value extended by continued 8-bit groups.
pub fn read_u64(br: &mut BitReader) -> Result<u64> {
    match br.read(2)? {
        0 => Ok(0),
        1 => Ok(br.read(4)? + 1),
        2 => Ok(br.read(8)? + 17),
        _ => {
            let mut value = br.read(12)?;
            let mut shift = 12;
            while br.read(1)? == 1 {
                if shift == 60 {
                    value |= br.read(4)? << shift;
                    break;
                }
                value |= br.read(8)? << shift;
                shift += 8;
            }
            Ok(value)
        }
    }
}

pub fn read_bool(br: &mut BitReader) -> Result<bool> {
    Ok(br.read(1)? != 0)
}

/// Bitstream-valued enums: `u2S(Val(0), Val(1), Bits(4) + 2, Bits(6) + 18)`.
pub fn read_enum<T: FromPrimitive>(name: &str, br: &mut BitReader) -> Result<T> {
    let value = U32Coder::Select(
        U32::Val(0),
        U32::Val(1),
        U32::BitsOffset { n: 4, off: 2 },
        U32::BitsOffset { n: 6, off: 18 },
    )
    .read(br)?;
    T::from_u32(value).ok_or_else(|| Error::InvalidEnum(value, name.into()))
}

/// Half-precision float stored in 16 bits, widened to f32.
pub fn read_f16(br: &mut BitReader) -> Result<f32> {
    let bits = br.read(16)? as u32;
    let sign = (bits >> 15) & 1;
    let exp = (bits >> 10) & 0x1F;
    let mantissa = bits & 0x3FF;
    let f32_bits = if exp == 0 {
        if mantissa == 0 {
            sign << 31
        } else {
            // Subnormal: renormalize.
            let e = mantissa.leading_zeros() - 22;
            (sign << 31) | ((112 - e) << 23) | ((mantissa << (14 + e)) & 0x7F_FFFF)
        }
    } else if exp == 0x1F {
        (sign << 31) | (0xFF << 23) | (mantissa << 13)
    } else {
        (sign << 31) | ((exp + 112) << 23) | (mantissa << 13)
    };
    Ok(f32::from_bits(f32_bits))
}

pub fn unpack_signed(value: u32) -> i32 {
    // 0 -> 0, 1 -> -1, 2 -> 1, 3 -> -2, ...
    if value & 1 == 0 {
        (value >> 1) as i32
    } else {
        -(((value >> 1) + 1) as i32)
    }
}
