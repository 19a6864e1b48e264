// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_reader::BitReader,
    error::Result,
    image::{Image, Rect},
    util::Xorshift128Plus,
};

pub const NOISE_LUT_SIZE: usize = 8;

/// Photon-noise intensity curve, sampled at eight points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Noise {
    pub lut: [f32; NOISE_LUT_SIZE],
}

impl Noise {
    pub fn read(br: &mut BitReader) -> Result<Noise> {
        let mut lut = [0.0; NOISE_LUT_SIZE];
        for v in lut.iter_mut() {
            *v = br.read(10)? as f32 * (1.0 / (1 << 10) as f32);
        }
        Ok(Noise { lut })
    }
}

const FLOATS_PER_BATCH: usize =
    Xorshift128Plus::N * std::mem::size_of::<u64>() / std::mem::size_of::<f32>();

fn bits_to_float(bits: u32) -> f32 {
    // Random mantissa in [1, 2).
    f32::from_bits((bits >> 9) | 0x3F800000)
}

/// Fills `rect` of the three planes with pseudo-random samples. A pure
/// function of the four seed integers: one generator, seeded from the frame
/// indices and the tile origin, is shared by the three planes in order.
pub fn random3planes(
    visible_frame_index: u32,
    nonvisible_frame_index: u32,
    x0: u32,
    y0: u32,
    rect: Rect,
    planes: &mut [Image<f32>; 3],
) {
    let mut rng =
        Xorshift128Plus::new_with_seeds(visible_frame_index, nonvisible_frame_index, x0, y0);
    let mut batch = [0u64; Xorshift128Plus::N];
    for plane in planes.iter_mut() {
        for y in rect.origin.1..rect.y1() {
            let row = plane.row_mut(y);
            for batch_index in 0..rect.size.0.div_ceil(FLOATS_PER_BATCH) {
                rng.fill(&mut batch);
                let batch_size = (rect.size.0 - batch_index * FLOATS_PER_BATCH).min(FLOATS_PER_BATCH);
                for i in 0..batch_size {
                    let x = rect.origin.0 + FLOATS_PER_BATCH * batch_index + i;
                    let k = i / 2;
                    let bits = if i % 2 != 0 {
                        (batch[k] >> 32) as u32
                    } else {
                        (batch[k] & 0xFFFF_FFFF) as u32
                    };
                    row[x] = bits_to_float(bits);
                }
            }
        }
    }
}
