// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod encodings;
pub mod frame_header;
pub mod toc;

/// Per-extra-channel information the frame decoder consumes. The full
/// channel descriptors (type, bit depth, name) live with the container-level
/// metadata parser, which is outside this crate.
#[derive(Clone, Debug, Default)]
pub struct ExtraChannelInfo {
    pub dim_shift: u32,
}

/// Image-wide metadata, provided by the host. The container and image-header
/// parsers that produce it are external collaborators; the frame decoder
/// only reads the fields that gate frame-header conditions and validation.
#[derive(Clone, Debug)]
pub struct ImageMetadata {
    pub xsize: u32,
    pub ysize: u32,
    pub xyb_encoded: bool,
    pub extra_channel_info: Vec<ExtraChannelInfo>,
    pub have_animation: bool,
    pub have_timecode: bool,
}

impl ImageMetadata {
    pub fn num_extra_channels(&self) -> u32 {
        self.extra_channel_info.len() as u32
    }
}

impl Default for ImageMetadata {
    fn default() -> Self {
        Self {
            xsize: 0,
            ysize: 0,
            xyb_encoded: true,
            extra_channel_info: Vec::new(),
            have_animation: false,
            have_timecode: false,
        }
    }
}
