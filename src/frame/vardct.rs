// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{bit_reader::BitReader, error::Result};

/// Number of distinct coefficient-order transform classes.
pub const NUM_ORDERS: usize = 13;

/// Number of zero-density contexts actually coded, and the padded bound the
/// group decoder indexes with so its hot loop can skip a range check.
pub const ZERO_DENSITY_CONTEXT_COUNT: usize = 458;
pub const ZERO_DENSITY_CONTEXT_LIMIT: usize = 474;

/// Sample width of the AC coefficient store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoeffPrecision {
    I16,
    I32,
}

/// The transform-coded side of the codec: quantizer, dequantization
/// matrices, entropy codes, coefficient orders and the coefficient decoder.
///
/// Everything here is written during the single-threaded global stages and
/// read-only during parallel group work; group-level methods take `&self`
/// and must tolerate concurrent calls on distinct groups.
pub trait VarDctCodec: Send + Sync {
    /// Global DC info: quantizer, block context map and the DC colour
    /// correlation. `disable_dc_dequant` is set when reconstructing JPEG,
    /// where DC must stay quantized.
    fn decode_dc_global(&mut self, br: &mut BitReader<'_>, disable_dc_dequant: bool) -> Result<()>;

    /// DC dequantization matrices.
    fn decode_dequant_dc(&mut self, br: &mut BitReader<'_>) -> Result<()>;

    /// Variable-DCT DC coefficients of one DC group.
    fn decode_dc_group(&self, group: usize, br: &mut BitReader<'_>) -> Result<()>;

    /// AC metadata (transform map, quant field, EPF sharpness) of one DC
    /// group.
    fn decode_ac_metadata(&self, group: usize, br: &mut BitReader<'_>) -> Result<()>;

    /// Smooths the DC image with the convolution described by the DC
    /// dequantization multipliers. Runs between the last DC group and any AC
    /// work.
    fn adaptive_dc_smoothing(&mut self) -> Result<()>;

    /// Non-DC dequantization matrices; implementations also materialize the
    /// tables for the AC strategies in use.
    fn decode_dequant_matrices(&mut self, br: &mut BitReader<'_>) -> Result<()>;

    /// Number of AC entropy contexts per histogram, from the block context
    /// map.
    fn num_ac_contexts(&self) -> usize;

    /// Coefficient orders of one pass, for the orders selected by
    /// `used_orders`.
    fn decode_coeff_orders(
        &mut self,
        pass: usize,
        used_orders: u32,
        br: &mut BitReader<'_>,
    ) -> Result<()>;

    /// Histograms and context map of one pass. Returns the entropy code's
    /// `max_num_bits`. Implementations pad the context map to
    /// `num_contexts + ZERO_DENSITY_CONTEXT_LIMIT - ZERO_DENSITY_CONTEXT_COUNT`
    /// entries.
    fn decode_pass_histograms(
        &mut self,
        pass: usize,
        num_contexts: usize,
        br: &mut BitReader<'_>,
    ) -> Result<u32>;

    /// Allocates the coefficient store. `num_groups == 0` when coefficients
    /// are not retained (single-pass frames decode straight to pixels).
    fn allocate_coefficients(
        &mut self,
        precision: CoeffPrecision,
        num_groups: usize,
        zero_fill: bool,
    ) -> Result<()>;

    /// The RAW DC quantization encoding, if the bitstream used one:
    /// `(table, denominator)` with three 64-entry channel tables. JPEG
    /// reconstruction validates and copies it.
    fn raw_quant_table(&self) -> Option<(&[i32], f32)>;

    /// Decodes `readers.len()` new AC passes of one group, writing pixels
    /// into the render-pipeline input buffers shared with the pipeline.
    /// With `force_draw`, missing passes are zero-filled; `dc_only`
    /// additionally skips AC entirely and upsamples DC. Returns whether the
    /// caller should run the render pipeline over the group.
    #[allow(clippy::too_many_arguments)]
    fn decode_ac_group(
        &self,
        group: usize,
        readers: &mut [BitReader<'_>],
        first_pass: usize,
        force_draw: bool,
        dc_only: bool,
        thread: usize,
    ) -> Result<bool>;

    /// Sizes per-thread group-decode caches; runs once before each parallel
    /// AC stage.
    fn prepare_storage(&self, num_threads: usize) -> Result<()>;
}
