// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod noise;

use crate::{bit_reader::BitReader, error::Result};

/// Entropy-coded image features read during the DC-global stage.
///
/// Patch and spline payloads use the entropy coder, which lives outside this
/// crate; the frame decoder orders and validates the reads, the codec parses
/// them.
pub trait FeaturesCodec: Send + Sync {
    /// Decodes the patch dictionary. Returns whether any patch blends into
    /// extra channels.
    fn decode_patches(&mut self, br: &mut BitReader, xsize: usize, ysize: usize) -> Result<bool>;

    /// Bitmask of reference-frame slots the patch dictionary draws from.
    fn patch_references(&self) -> u32;

    fn decode_splines(&mut self, br: &mut BitReader, num_pixels: u64) -> Result<()>;

    /// Builds the spline draw cache; called after the colour correlation map
    /// is known, with the upsampled frame size.
    fn init_splines_draw_cache(&mut self, xsize: usize, ysize: usize) -> Result<()>;
}
