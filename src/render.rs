// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{error::Result, image::Image};

/// Numerator used to turn an EPF sigma into the inverse-sigma plane the
/// filter consumes.
#[allow(clippy::excessive_precision)]
pub const INV_SIGMA_NUM: f32 = -1.1715728752538099024;

/// The per-pixel render pipeline (upsampling, loop filter, feature
/// application, blending), driven group by group.
///
/// The pipeline is an external collaborator: it shares its per-group input
/// buffers with the coefficient and modular decoders out of band. The frame
/// decoder only controls group lifecycle. Implementations must accept calls
/// on distinct groups from multiple threads; the done marker must be
/// sequentially consistent.
pub trait RenderPipeline: Send + Sync {
    /// Sizes per-thread buffers. Runs once before each parallel stage, with
    /// the number of threads that may participate.
    fn prepare(&self, num_threads: usize) -> Result<()>;

    /// Marks a group as not rendered, so that a later
    /// force-draw can re-run it. The recovery idiom for partial progress is
    /// `clear_done(g)` followed by a fresh force-draw decode of `g`.
    fn clear_done(&self, group: usize);

    /// Commits the group's input buffers and lets the pipeline run over
    /// them.
    fn commit_group(&self, group: usize, thread: usize) -> Result<()>;

    /// Fills the sigma plane with a constant; used for the edge-preserving
    /// filter when the frame is modular-coded.
    fn fill_epf_sigma(&self, inv_sigma: f32);

    /// Hands the pipeline the deterministic noise planes for one group.
    fn set_group_noise(&self, group: usize, planes: [Image<f32>; 3]) -> Result<()>;

    /// Moves the rendered frame out of the pipeline, either before or after
    /// the colour transform, for reference-frame publication.
    fn take_output(&mut self, before_color_transform: bool) -> Result<Vec<Image<f32>>>;
}
