// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Containers for JPEG reconstruction output. The bitstream-side
//! reconstruction data (`jbrd`) is parsed by the container layer; the frame
//! decoder only fills in geometry, quantization tables and coefficients.

/// One 8x8 quantization table, in natural (row-major) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JpegQuantTable {
    pub values: [i32; 64],
}

impl Default for JpegQuantTable {
    fn default() -> Self {
        Self { values: [0; 64] }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JpegComponent {
    pub quant_idx: usize,
    pub h_samp_factor: u32,
    pub v_samp_factor: u32,
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    pub coeffs: Vec<i16>,
}

/// JPEG data being reconstructed alongside the frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JpegData {
    pub width: usize,
    pub height: usize,
    pub is_ycbcr: bool,
    pub components: Vec<JpegComponent>,
    pub quant: Vec<JpegQuantTable>,
}

/// Maps color channels to JPEG component order. In YCbCr mode channel 1
/// carries luma; grayscale uses the single luma component for everything.
pub fn jpeg_order(is_ycbcr: bool, is_gray: bool) -> [usize; 3] {
    if is_gray {
        [0, 0, 0]
    } else if is_ycbcr {
        [1, 0, 2]
    } else {
        [0, 1, 2]
    }
}

/// Denominator of a RAW quantization-table encoding that stores plain JPEG
/// quantization values.
pub const JPEG_QUANT_DENOMINATOR: f32 = 1.0 / (8.0 * 255.0);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn component_order() {
        assert_eq!(jpeg_order(true, false), [1, 0, 2]);
        assert_eq!(jpeg_order(false, false), [0, 1, 2]);
        assert_eq!(jpeg_order(true, true), [0, 0, 0]);
    }
}
