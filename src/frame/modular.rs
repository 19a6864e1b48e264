// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_reader::BitReader,
    error::Result,
    frame::ImageBundle,
    headers::frame_header::FrameHeader,
    image::Rect,
};

/// Identifies one modular sub-stream inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModularStreamId {
    /// The per-DC-group stream carrying modular channels at DC coarseness.
    ModularDc(usize),
    /// The per-AC-group stream of one pass.
    ModularAc { group: usize, pass: usize },
}

/// Outcome of decoding the global modular info when partial input is
/// tolerated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalModularOutcome {
    Complete,
    /// The stream ended mid-section; retry with more input.
    Partial,
}

/// The modular sub-stream decoder.
///
/// Stream-level methods take `&self` because distinct groups are decoded
/// concurrently; implementations must tolerate concurrent calls on disjoint
/// streams (they own disjoint channel regions).
pub trait ModularCodec: Send + Sync {
    /// Decodes the global modular image info (transforms, trees, global
    /// channels). A non-fatal truncation is reported as
    /// [`GlobalModularOutcome::Partial`] when `allow_partial` is set.
    fn decode_global_info(
        &mut self,
        br: &mut BitReader<'_>,
        header: &FrameHeader,
        allow_partial: bool,
    ) -> Result<GlobalModularOutcome>;

    /// Decodes one sub-stream covering `rect`, restricted to channels whose
    /// squeeze shift lies in `shift`. `br == None` zero-fills instead of
    /// decoding (force-draw).
    fn decode_stream(
        &self,
        id: ModularStreamId,
        rect: Rect,
        shift: (i32, i32),
        br: Option<&mut BitReader<'_>>,
        allow_partial: bool,
    ) -> Result<()>;

    /// Whether a full modular image is kept and finalized at flush time
    /// (global squeeze/palette transforms), as opposed to streaming groups
    /// straight through the render pipeline.
    fn uses_full_image(&self) -> bool;

    /// Drops the full-image buffers when the render pipeline does not need
    /// them.
    fn drop_full_image_if_unused(&mut self);

    /// Undoes global modular transforms and converts integer planes into the
    /// float image bundle.
    fn finalize(&mut self, bundle: &mut ImageBundle, is_finalized: bool) -> Result<()>;
}
