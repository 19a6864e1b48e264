// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Frame decoding: per-frame state, the section scheduler and the frame
//! finalizer.

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    features::{noise::Noise, FeaturesCodec},
    frame::{modular::ModularCodec, vardct::VarDctCodec},
    headers::{
        frame_header::{Encoding, FrameDimensions, FrameHeader, FrameType, Flags},
        toc::{read_toc, Toc},
        ImageMetadata,
    },
    image::Image,
    jpeg::jpeg_order,
    parallel::ThreadPool,
    render::RenderPipeline,
    util::tracing_wrappers::*,
};

mod decode;
pub mod modular;
pub mod sections;
pub mod vardct;

pub use sections::{CloseVerdict, SectionCloser, SectionInfo};

pub const MAX_REFERENCE_FRAMES: usize = 4;
pub const MAX_DC_FRAMES: usize = 4;

/// Per-section outcome of a `process_sections` batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionStatus {
    Done = 0,
    /// Decoding ended mid-section; retry with more input.
    Partial = 1,
    /// Not processed in this batch; retry later.
    Skipped = 2,
    Duplicate = 3,
}

/// A decoded frame kept alive for later frames to blend against or patch
/// from.
#[derive(Debug)]
pub struct ReferenceFrame {
    pub frame: Vec<Image<f32>>,
    pub saved_before_color_transform: bool,
}

/// Codec state that outlives a single frame: reference and DC-frame slots
/// and the frame counters that seed the noise generator.
#[derive(Debug)]
pub struct DecoderState {
    pub metadata: ImageMetadata,
    pub reference_frames: [Option<ReferenceFrame>; MAX_REFERENCE_FRAMES],
    pub dc_frames: [Option<[Image<f32>; 3]>; MAX_DC_FRAMES],
    pub visible_frame_index: u32,
    pub nonvisible_frame_index: u32,
}

impl DecoderState {
    pub fn new(metadata: ImageMetadata) -> Self {
        Self {
            metadata,
            reference_frames: [None, None, None, None],
            dc_frames: [None, None, None, None],
            visible_frame_index: 0,
            nonvisible_frame_index: 0,
        }
    }

    pub fn reference_frame(&self, i: usize) -> Option<&ReferenceFrame> {
        assert!(i < MAX_REFERENCE_FRAMES);
        self.reference_frames[i].as_ref()
    }
}

/// The decoded output of a frame.
#[derive(Debug, Default)]
pub struct ImageBundle {
    pub origin: (i32, i32),
    pub duration: u32,
    /// Bytes of the frame that contributed to the decoded output.
    pub decoded_bytes: usize,
    pub color: Option<Vec<Image<f32>>>,
    /// Present when reconstructing a JPEG instead of pixels.
    pub jpeg: Option<crate::jpeg::JpegData>,
}

impl ImageBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_jpeg(&self) -> bool {
        self.jpeg.is_some()
    }
}

/// The sub-decoders and render pipeline a frame decoder drives. All of them
/// are external collaborators; see the trait docs for the thread-safety
/// contract.
pub struct FrameCodecs {
    pub vardct: Box<dyn VarDctCodec>,
    pub modular: Box<dyn ModularCodec>,
    pub features: Box<dyn FeaturesCodec>,
    pub pipeline: Box<dyn RenderPipeline>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameOptions {
    pub is_preview: bool,
    /// Missing sections are tolerated instead of aborting the frame.
    pub allow_partial_frames: bool,
    /// DC-global may end mid-section and report `Partial`.
    pub allow_partial_dc_global: bool,
    /// When false, only the header and TOC are parsed (frame skipping).
    pub output_needed: bool,
}

/// Host-facing decode policy, mirroring the decompression parameters of the
/// surrounding API layer.
#[derive(Clone, Copy, Debug)]
pub struct DecodeOptions {
    pub max_passes: u32,
    /// Highest acceptable downsampling factor; 8 or more keeps DC only.
    pub max_downsampling: u32,
    pub allow_partial_files: bool,
    pub allow_more_progressive_steps: bool,
    pub is_preview: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_passes: u32::MAX,
            max_downsampling: 1,
            allow_partial_files: false,
            allow_more_progressive_steps: false,
            is_preview: false,
        }
    }
}

/// Drives one frame from bitstream to image bundle.
///
/// Stage ordering is enforced by the state flags below; see
/// [`FrameDecoder::process_sections`].
pub struct FrameDecoder {
    header: FrameHeader,
    frame_dim: FrameDimensions,
    toc: Toc,
    codecs: FrameCodecs,
    state: DecoderState,
    bundle: ImageBundle,
    pool: ThreadPool,
    noise: Option<Noise>,

    allow_partial_frames: bool,
    allow_partial_dc_global: bool,
    pause_at_progressive: bool,
    output_needed: bool,

    decoded_dc_global: bool,
    decoded_ac_global: bool,
    finalized_dc: bool,
    is_finalized: bool,
    allocated: bool,
    decoded_dc_groups: Vec<bool>,
    decoded_passes_per_ac_group: Vec<u32>,
    processed_section: Vec<bool>,
    max_passes: u32,
    num_renders: u32,
}

impl FrameDecoder {
    /// Parses the frame header and TOC and prepares fresh per-frame state.
    /// The reader must be positioned at the frame start; on failure the
    /// decoder state is consumed and a fresh one is needed to retry.
    pub fn init_frame(
        br: &mut BitReader<'_>,
        mut state: DecoderState,
        codecs: FrameCodecs,
        mut bundle: ImageBundle,
        pool: ThreadPool,
        options: FrameOptions,
    ) -> Result<FrameDecoder> {
        let pos = br.total_bits_read() / 8;
        let header_result = if br.total_bytes() > pos {
            FrameHeader::read(br, &state.metadata, options.is_preview)
        } else {
            Err(Error::PrematureEndOfStream)
        };
        let header = match header_result {
            Ok(header) => header,
            Err(e) => {
                if !options.allow_partial_frames {
                    return Err(e);
                }
                if state.dc_frames[0].is_some() {
                    // A (partial) DC frame is available but the next frame
                    // header is not; assume the next frame uses that DC
                    // frame, which makes a reasonable progressive preview.
                    let mut header = FrameHeader::default_for(&state.metadata, options.is_preview);
                    header.flags |= Flags::USE_DC_FRAME;
                    header.encoding = Encoding::VarDCT;
                    header.dc_level = 0;
                    header
                } else {
                    return Err(Error::CouldntReadFrameHeader);
                }
            }
        };
        let frame_dim = header.to_frame_dimensions(&state.metadata);
        debug!(?header, ?frame_dim, "initializing frame");

        if header.is_visible() {
            state.visible_frame_index += 1;
            state.nonvisible_frame_index = 0;
        } else {
            state.nonvisible_frame_index += 1;
        }

        // The previous frame may have had different dimensions; reset the
        // output.
        bundle.color = None;
        bundle.duration = header.duration;

        let toc_entries = frame_dim.num_toc_entries(header.passes.num_passes as usize);
        let toc = match read_toc(br, toc_entries) {
            Ok(toc) => toc,
            Err(e) => {
                if !options.allow_partial_frames {
                    return Err(e);
                }
                Toc {
                    offsets: Vec::new(),
                    sizes: Vec::new(),
                    total_size: 0,
                }
            }
        };

        debug_assert_eq!(br.total_bits_read() % 8, 0);
        let group_codes_begin = (br.total_bits_read() / 8) as u64;
        crate::headers::toc::check_group_codes(group_codes_begin, toc.total_size)?;

        if !header.chroma_subsampling.is_444()
            && !header.skip_adaptive_dc_smoothing()
            && header.encoding == Encoding::VarDCT
        {
            return Err(Error::Non444ChromaSubsampling);
        }

        if options.output_needed {
            if bundle.is_jpeg() {
                if header.encoding == Encoding::Modular {
                    return Err(Error::JpegFromModular);
                }
                let jpeg = bundle.jpeg.as_mut().unwrap();
                let num_components = jpeg.components.len();
                if num_components != 1 && num_components != 3 {
                    return Err(Error::InvalidNumComponents);
                }
                if state.metadata.xyb_encoded {
                    return Err(Error::JpegFromXyb);
                }
                let component_order = jpeg_order(true, num_components == 1);
                jpeg.width = frame_dim.xsize;
                jpeg.height = frame_dim.ysize;
                for (c, &component_idx) in component_order.iter().enumerate().take(num_components) {
                    let component = &mut jpeg.components[component_idx];
                    let hshift = header.chroma_subsampling.hshift(c);
                    let vshift = header.chroma_subsampling.vshift(c);
                    component.width_in_blocks = frame_dim.xsize_blocks >> hshift;
                    component.height_in_blocks = frame_dim.ysize_blocks >> vshift;
                    component.h_samp_factor = 1 << (header.chroma_subsampling.max_hshift() - hshift);
                    component.v_samp_factor = 1 << (header.chroma_subsampling.max_vshift() - vshift);
                    component.coeffs = vec![
                        0;
                        component.width_in_blocks
                            * component.height_in_blocks
                            * (crate::BLOCK_DIM * crate::BLOCK_DIM)
                    ];
                }
            }
        }

        let num_sections = toc.offsets.len();
        let max_passes = header.passes.num_passes;
        Ok(FrameDecoder {
            decoded_dc_groups: vec![false; frame_dim.num_dc_groups],
            decoded_passes_per_ac_group: vec![0; frame_dim.num_groups],
            processed_section: vec![false; num_sections],
            header,
            frame_dim,
            toc,
            codecs,
            state,
            bundle,
            pool,
            noise: None,
            allow_partial_frames: options.allow_partial_frames,
            allow_partial_dc_global: options.allow_partial_dc_global,
            pause_at_progressive: false,
            output_needed: options.output_needed,
            decoded_dc_global: false,
            decoded_ac_global: false,
            finalized_dc: false,
            is_finalized: false,
            allocated: false,
            max_passes,
            num_renders: 0,
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn frame_dim(&self) -> &FrameDimensions {
        &self.frame_dim
    }

    pub fn num_sections(&self) -> usize {
        self.toc.offsets.len()
    }

    pub fn section_offsets(&self) -> &[u64] {
        &self.toc.offsets
    }

    pub fn section_sizes(&self) -> &[u32] {
        &self.toc.sizes
    }

    pub fn bundle(&self) -> &ImageBundle {
        &self.bundle
    }

    pub fn num_renders(&self) -> u32 {
        self.num_renders
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    pub fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    pub fn finalized_dc(&self) -> bool {
        self.finalized_dc
    }

    /// Noise parameters decoded in the DC-global section, for the render
    /// pipeline's noise stage.
    pub fn noise(&self) -> Option<&Noise> {
        self.noise.as_ref()
    }

    /// Clips the number of AC passes that will be decoded. Sections of
    /// later passes are silently skipped.
    pub fn set_max_passes(&mut self, max_passes: u32) {
        self.max_passes = max_passes.min(self.header.passes.num_passes);
    }

    /// Makes `process_sections` return early once DC can be emitted as a
    /// progressive preview.
    pub fn set_pause_at_progressive(&mut self, pause: bool) {
        self.pause_at_progressive = pause;
    }

    pub fn has_everything(&self) -> bool {
        self.decoded_dc_global
            && self.decoded_ac_global
            && self.decoded_dc_groups.iter().all(|&b| b)
            && self
                .decoded_passes_per_ac_group
                .iter()
                .all(|&p| p >= self.max_passes)
    }

    /// Which reference or DC-frame slot this frame will occupy once
    /// finalized: bits 0..4 for reference slots, bits 4..8 for the DC
    /// pyramid levels.
    pub fn saved_as(header: &FrameHeader) -> u32 {
        if header.frame_type == FrameType::DcFrame {
            16 << (header.dc_level - 1)
        } else if header.can_be_referenced() {
            1 << header.save_as_reference
        } else {
            0
        }
    }

    /// Mask of the saved-frame slots this frame read from, in the same bit
    /// layout as [`FrameDecoder::saved_as`]. Zero until the frame is
    /// finalized and fully decoded.
    pub fn references(&self) -> u32 {
        if !self.is_finalized || !self.has_everything() {
            return 0;
        }

        let mut result = 0u32;

        // Blending.
        if matches!(
            self.header.frame_type,
            FrameType::Regular | FrameType::SkipProgressive
        ) {
            let cropped = self.header.custom_size_or_origin;
            if cropped || self.header.blending_info.mode != crate::headers::frame_header::BlendMode::Replace
            {
                result |= 1 << self.header.blending_info.source;
            }
            for ec in &self.header.ec_blending_info {
                if cropped || ec.mode != crate::headers::frame_header::BlendMode::Replace {
                    result |= 1 << ec.source;
                }
            }
        }

        // Patches.
        if self.header.has_patches() {
            result |= self.codecs.features.patch_references();
        }

        // DC level: reads from the next level of the pyramid.
        if self.header.uses_dc_frame() {
            result |= 16 << self.header.dc_level;
        }

        result
    }

    /// Publishes reference frames and runs terminal validation. Fails when
    /// called twice.
    pub fn finalize_frame(&mut self) -> Result<()> {
        if self.is_finalized {
            return Err(Error::FinalizeFrameTwice);
        }
        self.is_finalized = true;
        if self.bundle.is_jpeg() {
            return Ok(());
        }
        if !self.finalized_dc {
            // Without all of DC the loop-filter decisions would be
            // unreliable, so disable EPF.
            self.header.restoration_filter.epf_iters = 0;
        }
        if !self.has_everything() && !self.allow_partial_frames {
            return Err(Error::FinalizeBeforeFullFrame);
        }

        if !self.finalized_dc {
            debug_assert!(self.allow_partial_frames);
            self.allocate_output()?;
        }

        self.flush()?;

        if self.header.can_be_referenced() {
            info!("saving frame in slot {}", self.header.save_as_reference);
            let frame = self.codecs.pipeline.take_output(self.header.save_before_ct)?;
            self.state.reference_frames[self.header.save_as_reference as usize] =
                Some(ReferenceFrame {
                    frame,
                    saved_before_color_transform: self.header.save_before_ct,
                });
        }
        if self.header.dc_level != 0 {
            let planes = self.codecs.pipeline.take_output(true)?;
            let planes: [Image<f32>; 3] = planes
                .try_into()
                .map_err(|_| Error::SubDecoder("DC frame must have 3 planes".into()))?;
            self.state.dc_frames[self.header.dc_level as usize - 1] = Some(planes);
        }
        Ok(())
    }

    /// Releases the output bundle and the cross-frame decoder state.
    pub fn into_parts(self) -> (ImageBundle, DecoderState) {
        (self.bundle, self.state)
    }
}

/// Decodes a whole frame: parses header and TOC, applies the progressive
/// policy, carves per-section readers out of the remaining input, processes
/// every section and finalizes.
pub fn decode_frame(
    options: &DecodeOptions,
    br: &mut BitReader<'_>,
    state: DecoderState,
    codecs: FrameCodecs,
    bundle: ImageBundle,
    pool: ThreadPool,
) -> Result<FrameDecoder> {
    let mut dec = FrameDecoder::init_frame(
        br,
        state,
        codecs,
        bundle,
        pool,
        FrameOptions {
            is_preview: options.is_preview,
            allow_partial_frames: options.allow_partial_files,
            allow_partial_dc_global: options.allow_partial_files
                && options.allow_more_progressive_steps,
            output_needed: true,
        },
    )?;

    // Progressive policy: clip the number of passes to the acceptable
    // downsampling.
    {
        let header = dec.header();
        let mut max_passes = options.max_passes;
        let max_downsampling =
            (options.max_downsampling >> (3 * header.dc_level)).max(1);
        if max_downsampling >= 8 {
            max_passes = 0;
        } else {
            for i in 0..header.passes.num_ds as usize {
                if max_downsampling >= header.passes.downsample[i]
                    && max_passes > header.passes.last_pass[i]
                {
                    max_passes = header.passes.last_pass[i] + 1;
                }
            }
        }
        // Reference-only frames bypass downsampling.
        if header.frame_type == FrameType::ReferenceOnly {
            max_passes = header.passes.num_passes;
        }
        dec.set_max_passes(max_passes);
    }

    let mut processed_bytes = br.total_bits_read() / 8;

    // The closer asserts at drop, on any exit path, that processed sections
    // were consumed to their declared end.
    let verdict = CloseVerdict::default();
    {
        let mut closer = SectionCloser::new(
            dec.sections(
                br,
                options.allow_more_progressive_steps,
                options.allow_partial_files,
            )?,
            &verdict,
        );
        dec.process_sections(&mut closer.sections, &mut closer.status)?;

        for (info, &st) in closer.sections.iter().zip(closer.status.iter()) {
            match st {
                SectionStatus::Done => {
                    processed_bytes += dec.section_sizes()[info.id] as usize;
                }
                SectionStatus::Partial if options.allow_more_progressive_steps => {}
                SectionStatus::Skipped if options.max_downsampling > 1 => {}
                st => return Err(Error::InvalidSectionStatus(info.id, st as u8)),
            }
        }
    }
    verdict.check()?;

    dec.finalize_frame()?;
    dec.bundle.decoded_bytes = processed_bytes;
    Ok(dec)
}
