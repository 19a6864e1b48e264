// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    headers::{
        encodings::{read_bool, read_enum, read_f16, read_u64, unpack_signed, U32Coder, U32},
        ImageMetadata,
    },
    BLOCK_DIM, GROUP_DIM, MAX_NUM_PASSES,
};

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum FrameType {
    Regular = 0,
    DcFrame = 1,
    ReferenceOnly = 2,
    SkipProgressive = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum Encoding {
    VarDCT = 0,
    Modular = 1,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum BlendMode {
    Replace = 0,
    Add = 1,
    Blend = 2,
    AlphaWeightedAdd = 3,
    Mul = 4,
}

pub struct Flags;

impl Flags {
    pub const NOISE: u64 = 1;
    pub const PATCHES: u64 = 2;
    pub const SPLINES: u64 = 0x10;
    pub const USE_DC_FRAME: u64 = 0x20;
    pub const SKIP_ADAPTIVE_DC_SMOOTHING: u64 = 0x80;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Passes {
    pub num_passes: u32,
    pub num_ds: u32,
    pub shift: Vec<u32>,
    pub downsample: Vec<u32>,
    pub last_pass: Vec<u32>,
}

impl Default for Passes {
    fn default() -> Self {
        Self {
            num_passes: 1,
            num_ds: 0,
            shift: Vec::new(),
            downsample: Vec::new(),
            last_pass: Vec::new(),
        }
    }
}

impl Passes {
    fn read(br: &mut BitReader) -> Result<Self> {
        let num_passes = U32Coder::Select(
            U32::Val(1),
            U32::Val(2),
            U32::Val(3),
            U32::BitsOffset { n: 3, off: 4 },
        )
        .read(br)?;
        if num_passes == 1 {
            return Ok(Self::default());
        }
        let num_ds = U32Coder::Select(
            U32::Val(0),
            U32::Val(1),
            U32::Val(2),
            U32::BitsOffset { n: 1, off: 3 },
        )
        .read(br)?;
        let mut shift = Vec::with_capacity(num_passes as usize - 1);
        for _ in 1..num_passes {
            shift.push(br.read(2)? as u32);
        }
        let mut downsample = Vec::with_capacity(num_ds as usize);
        for _ in 0..num_ds {
            downsample
                .push(U32Coder::Select(U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8)).read(br)?);
        }
        let mut last_pass = Vec::with_capacity(num_ds as usize);
        for _ in 0..num_ds {
            last_pass.push(
                U32Coder::Select(U32::Val(0), U32::Val(1), U32::Val(2), U32::Bits(3)).read(br)?,
            );
        }
        Ok(Self {
            num_passes,
            num_ds,
            shift,
            downsample,
            last_pass,
        })
    }

    /// Squeeze shift of the channels delivered by `pass`; the last pass
    /// always carries the full-resolution residual.
    pub fn shift_for(&self, pass: usize) -> u32 {
        if pass + 1 == self.num_passes as usize {
            0
        } else {
            self.shift[pass]
        }
    }

    /// Range of channel shifts the modular sub-streams of `pass` cover.
    pub fn downsampling_bracket(&self, pass: usize) -> (i32, i32) {
        let max_shift = if pass == 0 {
            2
        } else {
            self.shift_for(pass - 1) as i32 - 1
        };
        (self.shift_for(pass) as i32, max_shift)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlendingInfo {
    pub mode: BlendMode,
    pub alpha_channel: u32,
    pub clamp: bool,
    pub source: u32,
}

impl Default for BlendingInfo {
    fn default() -> Self {
        Self {
            mode: BlendMode::Replace,
            alpha_channel: 0,
            clamp: false,
            source: 0,
        }
    }
}

struct BlendingContext {
    num_extra_channels: u32,
    full_frame: bool,
}

impl BlendingInfo {
    fn read(br: &mut BitReader, ctx: &BlendingContext) -> Result<Self> {
        let mode: BlendMode = {
            let v = U32Coder::Select(
                U32::Val(0),
                U32::Val(1),
                U32::Val(2),
                U32::BitsOffset { n: 2, off: 3 },
            )
            .read(br)?;
            num_traits::FromPrimitive::from_u32(v)
                .ok_or_else(|| Error::InvalidEnum(v, "BlendMode".into()))?
        };
        let blends_alpha = matches!(mode, BlendMode::Blend | BlendMode::AlphaWeightedAdd);
        let alpha_channel = if ctx.num_extra_channels > 0 && blends_alpha {
            U32Coder::Select(
                U32::Val(0),
                U32::Val(1),
                U32::Val(2),
                U32::BitsOffset { n: 3, off: 3 },
            )
            .read(br)?
        } else {
            0
        };
        let clamp = if ctx.num_extra_channels > 0 && (blends_alpha || mode == BlendMode::Mul) {
            read_bool(br)?
        } else {
            false
        };
        let source = if mode != BlendMode::Replace && !ctx.full_frame {
            U32Coder::Select(U32::Val(0), U32::Val(1), U32::Val(2), U32::Val(3)).read(br)?
        } else {
            0
        };
        Ok(Self {
            mode,
            alpha_channel,
            clamp,
            source,
        })
    }
}

/// YCbCr chroma sampling modes, one per channel. Each mode encodes the
/// log2 sampling factors; shifts are relative to the largest factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChromaSubsampling {
    modes: [u32; 3],
}

impl Default for ChromaSubsampling {
    fn default() -> Self {
        Self { modes: [0, 0, 0] }
    }
}

const K_HSHIFT: [usize; 4] = [0, 1, 1, 0];
const K_VSHIFT: [usize; 4] = [0, 1, 0, 1];

impl ChromaSubsampling {
    fn read(br: &mut BitReader) -> Result<Self> {
        let mut modes = [0u32; 3];
        for mode in modes.iter_mut() {
            *mode = br.read(2)? as u32;
        }
        Ok(Self { modes })
    }

    pub fn max_hshift(&self) -> usize {
        self.modes.iter().map(|&m| K_HSHIFT[m as usize]).max().unwrap()
    }

    pub fn max_vshift(&self) -> usize {
        self.modes.iter().map(|&m| K_VSHIFT[m as usize]).max().unwrap()
    }

    pub fn hshift(&self, channel: usize) -> usize {
        self.max_hshift() - K_HSHIFT[self.modes[channel] as usize]
    }

    pub fn vshift(&self, channel: usize) -> usize {
        self.max_vshift() - K_VSHIFT[self.modes[channel] as usize]
    }

    pub fn is_444(&self) -> bool {
        self.max_hshift() == 0 && self.max_vshift() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestorationFilter {
    pub gab: bool,
    pub epf_iters: u32,
    pub epf_sigma_for_modular: f32,
}

impl Default for RestorationFilter {
    fn default() -> Self {
        Self {
            gab: true,
            epf_iters: 2,
            epf_sigma_for_modular: 1.0,
        }
    }
}

impl RestorationFilter {
    fn read(br: &mut BitReader, encoding: Encoding) -> Result<Self> {
        if read_bool(br)? {
            return Ok(Self::default());
        }
        let gab = read_bool(br)?;
        let epf_iters = br.read(2)? as u32;
        let epf_sigma_for_modular = if epf_iters > 0 && encoding == Encoding::Modular {
            read_f16(br)?
        } else {
            1.0
        };
        Ok(Self {
            gab,
            epf_iters,
            epf_sigma_for_modular,
        })
    }
}

/// Trailing extension payloads; parsed to keep the reader in sync, contents
/// skipped.
fn skip_extensions(br: &mut BitReader) -> Result<()> {
    let extensions = read_u64(br)?;
    let mut total_bits = 0u64;
    for i in 0..64 {
        if extensions & (1 << i) != 0 {
            total_bits = total_bits
                .checked_add(read_u64(br)?)
                .ok_or(Error::ArithmeticOverflow)?;
        }
    }
    if total_bits > br.total_bits_available() as u64 {
        return Err(Error::OutOfBounds);
    }
    br.skip_bits(total_bits as usize)?;
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub encoding: Encoding,
    pub flags: u64,
    pub do_ycbcr: bool,
    pub chroma_subsampling: ChromaSubsampling,
    pub upsampling: u32,
    pub ec_upsampling: Vec<u32>,
    pub group_size_shift: u32,
    pub x_qm_scale: u32,
    pub b_qm_scale: u32,
    pub passes: Passes,
    pub dc_level: u32,
    pub custom_size_or_origin: bool,
    pub x0: i32,
    pub y0: i32,
    pub width: u32,
    pub height: u32,
    pub blending_info: BlendingInfo,
    pub ec_blending_info: Vec<BlendingInfo>,
    pub duration: u32,
    pub timecode: u32,
    pub is_last: bool,
    pub save_as_reference: u32,
    pub save_before_ct: bool,
    pub name: String,
    pub restoration_filter: RestorationFilter,
    /// Not serialized; set by the host for preview frames.
    pub is_preview: bool,
}

impl FrameHeader {
    pub fn default_for(metadata: &ImageMetadata, is_preview: bool) -> Self {
        let num_ec = metadata.num_extra_channels() as usize;
        Self {
            frame_type: FrameType::Regular,
            encoding: Encoding::VarDCT,
            flags: 0,
            do_ycbcr: false,
            chroma_subsampling: ChromaSubsampling::default(),
            upsampling: 1,
            ec_upsampling: vec![1; num_ec],
            group_size_shift: 1,
            x_qm_scale: 3,
            b_qm_scale: 2,
            passes: Passes::default(),
            dc_level: 0,
            custom_size_or_origin: false,
            x0: 0,
            y0: 0,
            width: 0,
            height: 0,
            blending_info: BlendingInfo::default(),
            ec_blending_info: vec![BlendingInfo::default(); num_ec],
            duration: 0,
            timecode: 0,
            is_last: true,
            save_as_reference: 0,
            save_before_ct: false,
            name: String::new(),
            restoration_filter: RestorationFilter::default(),
            is_preview,
        }
    }

    pub fn read(
        br: &mut BitReader,
        metadata: &ImageMetadata,
        is_preview: bool,
    ) -> Result<FrameHeader> {
        if read_bool(br)? {
            return Ok(Self::default_for(metadata, is_preview));
        }
        let num_ec = metadata.num_extra_channels();

        let frame_type: FrameType = read_enum("FrameType", br)?;
        let encoding: Encoding = if br.read(1)? == 0 {
            Encoding::VarDCT
        } else {
            Encoding::Modular
        };
        let flags = read_u64(br)?;
        let do_ycbcr = if !metadata.xyb_encoded {
            read_bool(br)?
        } else {
            false
        };
        let chroma_subsampling = if do_ycbcr && flags & Flags::USE_DC_FRAME == 0 {
            ChromaSubsampling::read(br)?
        } else {
            ChromaSubsampling::default()
        };
        let (upsampling, ec_upsampling) = if flags & Flags::USE_DC_FRAME == 0 {
            let upsampling =
                U32Coder::Select(U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8)).read(br)?;
            let mut ec_upsampling = Vec::with_capacity(num_ec as usize);
            for _ in 0..num_ec {
                ec_upsampling.push(
                    U32Coder::Select(U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8)).read(br)?,
                );
            }
            (upsampling, ec_upsampling)
        } else {
            (1, vec![1; num_ec as usize])
        };
        let group_size_shift = if encoding == Encoding::Modular {
            br.read(2)? as u32
        } else {
            1
        };
        let (x_qm_scale, b_qm_scale) = if encoding == Encoding::VarDCT && metadata.xyb_encoded {
            (br.read(3)? as u32, br.read(3)? as u32)
        } else {
            (3, 2)
        };
        let passes = if frame_type != FrameType::ReferenceOnly {
            Passes::read(br)?
        } else {
            Passes::default()
        };
        let dc_level = if frame_type == FrameType::DcFrame {
            U32Coder::Select(U32::Val(1), U32::Val(2), U32::Val(3), U32::Val(4)).read(br)?
        } else {
            0
        };
        let custom_size_or_origin = if frame_type != FrameType::DcFrame {
            read_bool(br)?
        } else {
            false
        };
        let offset_coder = || {
            U32Coder::Select(
                U32::Bits(8),
                U32::BitsOffset { n: 11, off: 256 },
                U32::BitsOffset { n: 14, off: 2304 },
                U32::BitsOffset { n: 30, off: 18688 },
            )
        };
        let (x0, y0) = if custom_size_or_origin && frame_type != FrameType::ReferenceOnly {
            (
                unpack_signed(offset_coder().read(br)?),
                unpack_signed(offset_coder().read(br)?),
            )
        } else {
            (0, 0)
        };
        let (width, height) = if custom_size_or_origin {
            (offset_coder().read(br)?, offset_coder().read(br)?)
        } else {
            (0, 0)
        };

        let normal_frame =
            frame_type == FrameType::Regular || frame_type == FrameType::SkipProgressive;
        let frame_width = if custom_size_or_origin {
            width
        } else {
            metadata.xsize
        };
        let frame_height = if custom_size_or_origin {
            height
        } else {
            metadata.ysize
        };
        let full_frame = !custom_size_or_origin
            || (x0 == 0
                && y0 == 0
                && frame_width as i64 + x0 as i64 >= metadata.xsize as i64
                && frame_height as i64 + y0 as i64 >= metadata.ysize as i64);
        let blend_ctx = BlendingContext {
            num_extra_channels: num_ec,
            full_frame,
        };
        let (blending_info, ec_blending_info) = if normal_frame {
            let blending_info = BlendingInfo::read(br, &blend_ctx)?;
            let mut ec_blending_info = Vec::with_capacity(num_ec as usize);
            for _ in 0..num_ec {
                ec_blending_info.push(BlendingInfo::read(br, &blend_ctx)?);
            }
            (blending_info, ec_blending_info)
        } else {
            (
                BlendingInfo::default(),
                vec![BlendingInfo::default(); num_ec as usize],
            )
        };
        let duration = if normal_frame && metadata.have_animation {
            U32Coder::Select(U32::Val(0), U32::Val(1), U32::Bits(8), U32::Bits(32)).read(br)?
        } else {
            0
        };
        let timecode = if normal_frame && metadata.have_timecode {
            br.read(32)? as u32
        } else {
            0
        };
        let is_last = if normal_frame {
            read_bool(br)?
        } else {
            false
        };
        let save_as_reference = if frame_type != FrameType::DcFrame && !is_last {
            br.read(2)? as u32
        } else {
            0
        };
        let default_save_before_ct = !full_frame
            && normal_frame
            && blending_info.mode == BlendMode::Replace
            && (duration == 0 || save_as_reference != 0)
            && !is_last;
        let save_before_ct = if frame_type != FrameType::DcFrame {
            read_bool(br)?
        } else {
            default_save_before_ct
        };
        let name_len = U32Coder::Select(
            U32::Val(0),
            U32::Bits(4),
            U32::BitsOffset { n: 5, off: 16 },
            U32::BitsOffset { n: 10, off: 48 },
        )
        .read(br)?;
        let mut name_bytes = Vec::with_capacity(name_len as usize);
        for _ in 0..name_len {
            name_bytes.push(br.read(8)? as u8);
        }
        let name = String::from_utf8(name_bytes).map_err(|_| Error::InvalidFrameName)?;
        let restoration_filter = RestorationFilter::read(br, encoding)?;
        skip_extensions(br)?;

        let header = FrameHeader {
            frame_type,
            encoding,
            flags,
            do_ycbcr,
            chroma_subsampling,
            upsampling,
            ec_upsampling,
            group_size_shift,
            x_qm_scale,
            b_qm_scale,
            passes,
            dc_level,
            custom_size_or_origin,
            x0,
            y0,
            width,
            height,
            blending_info,
            ec_blending_info,
            duration,
            timecode,
            is_last,
            save_as_reference,
            save_before_ct,
            name,
            restoration_filter,
            is_preview,
        };
        header.check(metadata)?;
        Ok(header)
    }

    fn check(&self, metadata: &ImageMetadata) -> Result<()> {
        if self.upsampling > 1 {
            for (info, &ec_upsampling) in metadata
                .extra_channel_info
                .iter()
                .zip(self.ec_upsampling.iter())
            {
                if (ec_upsampling << info.dim_shift) < self.upsampling || ec_upsampling > 8 {
                    return Err(Error::InvalidEcUpsampling(self.upsampling, ec_upsampling));
                }
            }
        }
        if self.passes.num_ds >= self.passes.num_passes {
            return Err(Error::NumPassesTooLarge(
                self.passes.num_ds,
                self.passes.num_passes,
            ));
        }
        debug_assert!(self.passes.num_passes as usize <= MAX_NUM_PASSES);
        Ok(())
    }

    pub fn has_patches(&self) -> bool {
        self.flags & Flags::PATCHES != 0
    }

    pub fn has_splines(&self) -> bool {
        self.flags & Flags::SPLINES != 0
    }

    pub fn has_noise(&self) -> bool {
        self.flags & Flags::NOISE != 0
    }

    pub fn uses_dc_frame(&self) -> bool {
        self.flags & Flags::USE_DC_FRAME != 0
    }

    pub fn skip_adaptive_dc_smoothing(&self) -> bool {
        self.flags & Flags::SKIP_ADAPTIVE_DC_SMOOTHING != 0
    }

    pub fn should_do_adaptive_dc_smoothing(&self) -> bool {
        self.encoding == Encoding::VarDCT
            && !self.skip_adaptive_dc_smoothing()
            && !self.uses_dc_frame()
    }

    /// DC frames cannot be referenced; neither can the last frame.
    pub fn can_be_referenced(&self) -> bool {
        !self.is_last && self.frame_type != FrameType::DcFrame
    }

    pub fn is_visible(&self) -> bool {
        !self.is_preview
            && (self.is_last || self.duration > 0)
            && matches!(
                self.frame_type,
                FrameType::Regular | FrameType::SkipProgressive
            )
    }

    /// Size of the frame in upsampled pixels, before the DC-pyramid shift.
    fn base_size(&self, metadata: &ImageMetadata) -> (usize, usize) {
        if self.custom_size_or_origin {
            (self.width as usize, self.height as usize)
        } else {
            (metadata.xsize as usize, metadata.ysize as usize)
        }
    }

    pub fn to_frame_dimensions(&self, metadata: &ImageMetadata) -> FrameDimensions {
        let (xsize, ysize) = self.base_size(metadata);
        let shift = 3 * self.dc_level as usize;
        FrameDimensions::new(
            xsize.div_ceil(1 << shift),
            ysize.div_ceil(1 << shift),
            self.group_size_shift as usize,
            self.chroma_subsampling.max_hshift(),
            self.chroma_subsampling.max_vshift(),
            self.upsampling as usize,
        )
    }
}

/// Pixel, block and group geometry derived from the frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDimensions {
    pub xsize: usize,
    pub ysize: usize,
    pub xsize_padded: usize,
    pub ysize_padded: usize,
    pub xsize_upsampled: usize,
    pub ysize_upsampled: usize,
    pub xsize_blocks: usize,
    pub ysize_blocks: usize,
    pub xsize_groups: usize,
    pub ysize_groups: usize,
    pub xsize_dc_groups: usize,
    pub ysize_dc_groups: usize,
    pub num_groups: usize,
    pub num_dc_groups: usize,
    pub group_dim: usize,
    pub dc_group_dim: usize,
}

impl FrameDimensions {
    fn new(
        xsize_upsampled: usize,
        ysize_upsampled: usize,
        group_size_shift: usize,
        max_hshift: usize,
        max_vshift: usize,
        upsampling: usize,
    ) -> Self {
        let group_dim = (GROUP_DIM >> 1) << group_size_shift;
        let dc_group_dim = group_dim * BLOCK_DIM;
        let xsize = xsize_upsampled.div_ceil(upsampling);
        let ysize = ysize_upsampled.div_ceil(upsampling);
        let xsize_blocks = xsize.div_ceil(BLOCK_DIM << max_hshift) << max_hshift;
        let ysize_blocks = ysize.div_ceil(BLOCK_DIM << max_vshift) << max_vshift;
        let xsize_groups = xsize.div_ceil(group_dim);
        let ysize_groups = ysize.div_ceil(group_dim);
        let xsize_dc_groups = xsize_blocks.div_ceil(group_dim);
        let ysize_dc_groups = ysize_blocks.div_ceil(group_dim);
        Self {
            xsize,
            ysize,
            xsize_padded: xsize_blocks * BLOCK_DIM,
            ysize_padded: ysize_blocks * BLOCK_DIM,
            xsize_upsampled,
            ysize_upsampled,
            xsize_blocks,
            ysize_blocks,
            xsize_groups,
            ysize_groups,
            xsize_dc_groups,
            ysize_dc_groups,
            num_groups: xsize_groups * ysize_groups,
            num_dc_groups: xsize_dc_groups * ysize_dc_groups,
            group_dim,
            dc_group_dim,
        }
    }

    /// Number of TOC entries; a one-group single-pass frame stores everything
    /// in one combined section.
    pub fn num_toc_entries(&self, num_passes: usize) -> usize {
        if self.num_groups == 1 && num_passes == 1 {
            1
        } else {
            2 + self.num_dc_groups + self.num_groups * num_passes
        }
    }
}
