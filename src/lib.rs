// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Frame-level decoder core for the JXP progressive image codec.
//!
//! A compressed frame is a table of contents plus a set of sections that can
//! be decoded largely in parallel. This crate drives a frame from raw
//! bitstream to a reconstructed image bundle, coordinating the entropy, DC,
//! AC and modular sub-decoders, the render pipeline and a thread pool. The
//! sub-decoders themselves live behind the trait seams in [`frame::modular`],
//! [`frame::vardct`] and [`render`].

pub mod bit_reader;
pub mod error;
pub mod features;
pub mod frame;
pub mod headers;
pub mod image;
pub mod jpeg;
pub mod parallel;
pub mod render;
mod util;

/// Side length, in pixels, of an AC group in VarDCT mode.
pub const GROUP_DIM: usize = 256;

/// Side length, in pixels, of a transform block.
pub const BLOCK_DIM: usize = 8;

/// Upper bound on the number of AC passes a frame header can declare.
pub const MAX_NUM_PASSES: usize = 11;
