// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read out of bounds")]
    OutOfBounds,
    #[error("Non-zero padding bits")]
    NonZeroPadding,
    #[error("Premature end of stream")]
    PrematureEndOfStream,
    #[error("Invalid group codes")]
    InvalidGroupCodes,
    #[error("Non-444 chroma subsampling is not allowed when adaptive DC smoothing is enabled")]
    Non444ChromaSubsampling,
    #[error("Invalid number of components")]
    InvalidNumComponents,
    #[error("Cannot decode to JPEG an XYB image")]
    JpegFromXyb,
    #[error("Cannot output JPEG from Modular")]
    JpegFromModular,
    #[error("Couldn't read frame header")]
    CouldntReadFrameHeader,
    #[error("Quantization table is not a JPEG quantization table.")]
    NotAJpegQuantTable,
    #[error("First quant table unused.")]
    FirstQuantTableUnused,
    #[error("Invalid section ID")]
    InvalidSectionId,
    #[error("Invalid section {0} status: {1}")]
    InvalidSectionStatus(usize, u8),
    #[error("Error in DC group")]
    DcGroupError,
    #[error("Error in AC group")]
    AcGroupError,
    #[error("FinalizeFrame called multiple times")]
    FinalizeFrameTwice,
    #[error("FinalizeFrame called before the frame was fully decoded")]
    FinalizeBeforeFullFrame,
    #[error("Drawing groups failed")]
    DrawingGroupsFailed,
    #[error(
        "Cannot use extra channels in patches if color channels are \
         subsampled differently from extra channels"
    )]
    PatchesEcUpsamplingMismatch,
    #[error("Invalid enum value {0} for {1}")]
    InvalidEnum(u32, String),
    #[error("Invalid extra channel upsampling: upsampling: {0} ec_upsampling: {1}")]
    InvalidEcUpsampling(u32, u32),
    #[error("Num_ds: {0} should be smaller than num_passes: {1}")]
    NumPassesTooLarge(u32, u32),
    #[error("Permuted TOC is not supported")]
    PermutedTocUnsupported,
    #[error("Frame name is not valid UTF-8")]
    InvalidFrameName,
    #[error("Section {0} was not fully consumed: {1} bits left")]
    SectionNotConsumed(usize, usize),
    #[error("Invalid JPEG component quantization index")]
    InvalidJpegComponent,
    #[error("Image size too large: {0}x{1}")]
    ImageSizeTooLarge(usize, usize),
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    /// Failure reported by a collaborating sub-decoder that does not map to
    /// a bitstream condition of this crate.
    #[error("Sub-decoder error: {0}")]
    SubDecoder(String),
}

pub type Result<T> = std::result::Result<T, Error>;
