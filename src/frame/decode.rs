// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Stage executors and the section scheduler.
//!
//! Stages are linearised as DC-global, DC-groups, finalize-DC, AC-global,
//! AC-groups; within the two group stages, groups are independent and run on
//! the thread pool. The scheduler is the only writer of the per-frame state
//! vectors: workers receive exclusive work items and report per-item
//! results, which are applied after the join barrier.

use std::mem;

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    features::noise::{random3planes, Noise},
    frame::{
        modular::{GlobalModularOutcome, ModularStreamId},
        sections::{classify_section, SectionInfo, SectionKind},
        vardct::{CoeffPrecision, NUM_ORDERS},
        FrameDecoder, SectionStatus,
    },
    headers::{
        encodings::{U32Coder, U32},
        frame_header::{BlendMode, Encoding, FrameType},
    },
    image::{Image, Rect},
    jpeg::{jpeg_order, JPEG_QUANT_DENOMINATOR},
    render::INV_SIGMA_NUM,
    util::{tracing_wrappers::*, CeilLog2},
};

/// Where each batch entry fits in the frame, resolved once per batch.
struct SectionPlan {
    dc_global: Option<usize>,
    ac_global: Option<usize>,
    /// DC group -> batch index.
    dc_group: Vec<Option<usize>>,
    /// AC group -> pass -> batch index.
    ac_group: Vec<Vec<Option<usize>>>,
    /// New contiguous passes available per AC group.
    num_new_passes: Vec<usize>,
    single_section: bool,
}

struct DcGroupTask<'a> {
    batch: usize,
    group: usize,
    br: BitReader<'a>,
}

struct AcGroupTask<'a> {
    group: usize,
    first_pass: usize,
    batch_indices: Vec<usize>,
    readers: Vec<BitReader<'a>>,
}

struct ForceDrawTask {
    group: usize,
    first_pass: usize,
}

impl FrameDecoder {
    /// Processes a batch of sections, running every stage that becomes
    /// eligible. Fills `status` with the per-entry outcome; statuses
    /// `Skipped` and `Partial` leave the section eligible for a retry with
    /// more input. Batches for the same frame must not overlap in time.
    pub fn process_sections(
        &mut self,
        sections: &mut [SectionInfo<'_>],
        status: &mut [SectionStatus],
    ) -> Result<()> {
        assert_eq!(sections.len(), status.len());
        if sections.is_empty() {
            return Ok(());
        }
        debug_assert!(self.output_needed);
        status.fill(SectionStatus::Skipped);

        let plan = match self.plan_sections(sections, status)? {
            Some(plan) => plan,
            // Every entry was a duplicate.
            None => return Ok(()),
        };

        if let Some(i) = plan.dc_global {
            status[i] = if self.process_dc_global(&mut sections[i].br)? {
                SectionStatus::Done
            } else {
                SectionStatus::Partial
            };
        }

        if self.decoded_dc_global {
            self.run_dc_group_stage(&plan, sections, status)?;
        }

        if self.decoded_dc_groups.iter().all(|&b| b) && !self.finalized_dc {
            self.codecs.pipeline.prepare(self.pool.num_threads())?;
            self.finalize_dc()?;
            self.allocate_output()?;
            if self.pause_at_progressive && !plan.single_section && self.can_return_dc_preview() {
                self.mark_sections(sections, status);
                return Ok(());
            }
        }

        if self.finalized_dc && !self.decoded_ac_global {
            if let Some(i) = plan.ac_global {
                self.process_ac_global(&mut sections[i].br)?;
                status[i] = SectionStatus::Done;
            }
        }

        if self.decoded_ac_global {
            self.run_ac_group_stage(&plan, sections, status)?;
        }

        self.mark_sections(sections, status);
        Ok(())
    }

    /// Classifies the batch, detecting duplicates and soft-skipping AC
    /// sections beyond the progressive cap. Returns `None` when nothing is
    /// left to do.
    fn plan_sections(
        &mut self,
        sections: &[SectionInfo<'_>],
        status: &mut [SectionStatus],
    ) -> Result<Option<SectionPlan>> {
        let num_groups = self.frame_dim.num_groups;
        let num_dc_groups = self.frame_dim.num_dc_groups;
        let num_passes = self.header.passes.num_passes as usize;
        let single_section = num_groups == 1 && num_passes == 1;

        let mut plan = SectionPlan {
            dc_global: None,
            ac_global: None,
            dc_group: vec![None; num_dc_groups],
            ac_group: vec![vec![None; num_passes]; num_groups],
            num_new_passes: vec![0; num_groups],
            single_section,
        };

        if single_section {
            // The whole frame is one combined section: the single reader
            // serves DC-global, DC-group 0, AC-global and AC-group (0, 0),
            // whose sub-streams are concatenated in that order.
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0].id, 0);
            if self.processed_section[0] {
                status[0] = SectionStatus::Duplicate;
                return Ok(None);
            }
            self.processed_section[0] = true;
            plan.dc_global = Some(0);
            plan.dc_group[0] = Some(0);
            plan.ac_global = Some(0);
            plan.ac_group[0][0] = Some(0);
            plan.num_new_passes[0] = 1;
            return Ok(Some(plan));
        }

        for (i, section) in sections.iter().enumerate() {
            if section.id >= self.processed_section.len() {
                return Err(Error::InvalidSectionId);
            }
            if self.processed_section[section.id] {
                status[i] = SectionStatus::Duplicate;
                continue;
            }
            match classify_section(section.id, num_dc_groups, num_groups, num_passes)? {
                SectionKind::DcGlobal => plan.dc_global = Some(i),
                SectionKind::DcGroup(group) => plan.dc_group[group] = Some(i),
                SectionKind::AcGlobal => plan.ac_global = Some(i),
                SectionKind::AcGroup { group, pass } => {
                    if pass >= self.max_passes as usize {
                        // Beyond the progressive cap; stays Skipped.
                        continue;
                    }
                    plan.ac_group[group][pass] = Some(i);
                }
            }
            self.processed_section[section.id] = true;
        }

        for g in 0..num_groups {
            let first = self.decoded_passes_per_ac_group[g] as usize;
            let mut new_passes = 0;
            while first + new_passes < self.max_passes as usize
                && plan.ac_group[g][first + new_passes].is_some()
            {
                new_passes += 1;
            }
            plan.num_new_passes[g] = new_passes;
        }
        Ok(Some(plan))
    }

    fn run_dc_group_stage(
        &mut self,
        plan: &SectionPlan,
        sections: &mut [SectionInfo<'_>],
        status: &mut [SectionStatus],
    ) -> Result<()> {
        let mut tasks = Vec::new();
        for (group, &batch) in plan.dc_group.iter().enumerate() {
            if let Some(batch) = batch {
                tasks.push(DcGroupTask {
                    batch,
                    group,
                    br: mem::take(&mut sections[batch].br),
                });
            }
        }
        if tasks.is_empty() {
            return Ok(());
        }
        let results = self.pool.run(
            &mut tasks,
            |_| Ok(()),
            |_, thread, task| self.process_dc_group(task.group, &mut task.br, thread),
            "DecodeDCGroup",
        )?;
        let mut failed = false;
        for (task, result) in tasks.iter_mut().zip(results) {
            sections[task.batch].br = mem::take(&mut task.br);
            match result {
                Ok(()) => {
                    self.decoded_dc_groups[task.group] = true;
                    status[task.batch] = SectionStatus::Done;
                }
                Err(e) => {
                    warn!(group = task.group, "DC group failed: {e}");
                    failed = true;
                }
            }
        }
        if failed {
            return Err(Error::DcGroupError);
        }
        Ok(())
    }

    fn run_ac_group_stage(
        &mut self,
        plan: &SectionPlan,
        sections: &mut [SectionInfo<'_>],
        status: &mut [SectionStatus],
    ) -> Result<()> {
        // Mark the groups that received new data as not complete yet. When
        // the modular image is finalized as a whole, every group is
        // re-rendered at flush time.
        for (g, &new_passes) in plan.num_new_passes.iter().enumerate() {
            if new_passes == 0 && !self.codecs.modular.uses_full_image() {
                continue;
            }
            self.codecs.pipeline.clear_done(g);
        }

        let mut tasks = Vec::new();
        for (group, &new_passes) in plan.num_new_passes.iter().enumerate() {
            if new_passes == 0 {
                continue;
            }
            let first_pass = self.decoded_passes_per_ac_group[group] as usize;
            let mut batch_indices = Vec::with_capacity(new_passes);
            let mut readers = Vec::with_capacity(new_passes);
            for pass in first_pass..first_pass + new_passes {
                let batch = plan.ac_group[group][pass].unwrap();
                batch_indices.push(batch);
                readers.push(mem::take(&mut sections[batch].br));
            }
            tasks.push(AcGroupTask {
                group,
                first_pass,
                batch_indices,
                readers,
            });
        }
        if tasks.is_empty() {
            return Ok(());
        }

        let results = self.pool.run(
            &mut tasks,
            |num_threads| {
                self.codecs.vardct.prepare_storage(num_threads)?;
                self.codecs.pipeline.prepare(num_threads)
            },
            |_, thread, task| {
                self.process_ac_group(
                    task.group,
                    &mut task.readers,
                    task.first_pass,
                    /*force_draw=*/ false,
                    /*dc_only=*/ false,
                    thread,
                )
            },
            "DecodeGroup",
        )?;
        let mut failed = false;
        for (task, result) in tasks.iter_mut().zip(results) {
            for (&batch, reader) in task.batch_indices.iter().zip(task.readers.iter_mut()) {
                sections[batch].br = mem::take(reader);
            }
            match result {
                Ok(()) => {
                    self.decoded_passes_per_ac_group[task.group] += task.batch_indices.len() as u32;
                    for &batch in &task.batch_indices {
                        status[batch] = SectionStatus::Done;
                    }
                }
                Err(e) => {
                    warn!(group = task.group, "AC group failed: {e}");
                    failed = true;
                }
            }
        }
        if failed {
            return Err(Error::AcGroupError);
        }
        Ok(())
    }

    /// Sections left `Skipped` or `Partial` are un-marked so that a later
    /// batch (with more context or more input) can submit them again.
    fn mark_sections(&mut self, sections: &[SectionInfo<'_>], status: &[SectionStatus]) {
        for (section, &status) in sections.iter().zip(status.iter()) {
            if matches!(status, SectionStatus::Skipped | SectionStatus::Partial) {
                self.processed_section[section.id] = false;
            }
        }
    }

    /// DC can stand in for the image as a 1/8-scale preview only when the
    /// render pipeline can be driven without the AC data.
    fn can_return_dc_preview(&self) -> bool {
        // Extra channels may be squeeze-coded without a meaningful DC, and
        // modular DC is not guaranteed to be populated at all.
        self.state.metadata.extra_channel_info.is_empty()
            && self.header.encoding == Encoding::VarDCT
    }

    /// Returns whether the section was fully decoded; `false` is the
    /// non-fatal partial outcome allowed by `allow_partial_dc_global`.
    fn process_dc_global(&mut self, br: &mut BitReader<'_>) -> Result<bool> {
        info!("processing DC global");
        if self.header.has_patches() {
            let uses_extra_channels = self.codecs.features.decode_patches(
                br,
                self.frame_dim.xsize_padded,
                self.frame_dim.ysize_padded,
            )?;
            if uses_extra_channels && self.header.upsampling != 1 {
                for &ec_upsampling in &self.header.ec_upsampling {
                    if ec_upsampling != self.header.upsampling {
                        return Err(Error::PatchesEcUpsamplingMismatch);
                    }
                }
            }
        }
        if self.header.has_splines() {
            self.codecs.features.decode_splines(
                br,
                self.frame_dim.xsize as u64 * self.frame_dim.ysize as u64,
            )?;
        }
        if self.header.has_noise() {
            self.noise = Some(Noise::read(br)?);
        }
        if !self.allow_partial_dc_global || br.total_bits_read() < br.total_bytes() * 8 {
            self.codecs.vardct.decode_dequant_dc(br)?;
            if self.header.encoding == Encoding::VarDCT {
                self.codecs
                    .vardct
                    .decode_dc_global(br, self.bundle.is_jpeg())?;
            }
        }
        // The splines draw cache uses the colour correlation map, so it can
        // only be built now.
        if self.header.has_splines() {
            self.codecs.features.init_splines_draw_cache(
                self.frame_dim.xsize_upsampled,
                self.frame_dim.ysize_upsampled,
            )?;
        }
        match self
            .codecs
            .modular
            .decode_global_info(br, &self.header, self.allow_partial_dc_global)?
        {
            GlobalModularOutcome::Complete => {
                self.decoded_dc_global = true;
                Ok(true)
            }
            GlobalModularOutcome::Partial => Ok(false),
        }
    }

    fn process_dc_group(&self, group: usize, br: &mut BitReader<'_>, _thread: usize) -> Result<()> {
        debug!(group, "processing DC group");
        let gx = group % self.frame_dim.xsize_dc_groups;
        let gy = group / self.frame_dim.xsize_dc_groups;
        if self.header.encoding == Encoding::VarDCT && !self.header.uses_dc_frame() {
            self.codecs.vardct.decode_dc_group(group, br)?;
        }
        let dc_group_dim = self.frame_dim.dc_group_dim;
        let rect = Rect {
            origin: (gx * dc_group_dim, gy * dc_group_dim),
            size: (dc_group_dim, dc_group_dim),
        };
        self.codecs.modular.decode_stream(
            ModularStreamId::ModularDc(group),
            rect,
            (3, i32::MAX),
            Some(br),
            self.allow_partial_frames,
        )?;
        if self.header.encoding == Encoding::VarDCT {
            self.codecs.vardct.decode_ac_metadata(group, br)?;
        } else if self.header.restoration_filter.epf_iters > 0 {
            self.codecs.pipeline.fill_epf_sigma(
                INV_SIGMA_NUM / self.header.restoration_filter.epf_sigma_for_modular,
            );
        }
        Ok(())
    }

    /// Runs between the last DC group and any AC work, exactly once.
    fn finalize_dc(&mut self) -> Result<()> {
        debug_assert!(self.decoded_dc_groups.iter().all(|&b| b));
        debug_assert!(!self.finalized_dc);
        if self.header.should_do_adaptive_dc_smoothing() {
            self.codecs.vardct.adaptive_dc_smoothing()?;
        }
        self.finalized_dc = true;
        Ok(())
    }

    /// Idempotent; runs at the DC-to-AC boundary and before any best-effort
    /// render of a partial frame.
    pub(super) fn allocate_output(&mut self) -> Result<()> {
        if self.allocated {
            return Ok(());
        }
        self.codecs.modular.drop_full_image_if_unused();
        self.bundle.origin = (self.header.x0, self.header.y0);
        self.allocated = true;
        Ok(())
    }

    fn process_ac_global(&mut self, br: &mut BitReader<'_>) -> Result<()> {
        debug_assert!(self.finalized_dc);
        if self.header.encoding == Encoding::VarDCT {
            self.codecs.vardct.decode_dequant_matrices(br)?;

            let num_histo_bits = self.frame_dim.num_groups.ceil_log2();
            let num_histograms = 1 + br.read(num_histo_bits)? as u32;
            info!(
                num_passes = self.header.passes.num_passes,
                num_histograms, "processing AC global"
            );

            let mut max_num_bits_ac = 0u32;
            for pass in 0..self.header.passes.num_passes as usize {
                let used_orders = U32Coder::Select(
                    U32::Val(0x5F),
                    U32::Val(0x13),
                    U32::Val(0),
                    U32::Bits(NUM_ORDERS),
                )
                .read(br)?;
                debug!(used_orders);
                self.codecs.vardct.decode_coeff_orders(pass, used_orders, br)?;
                let num_contexts =
                    num_histograms as usize * self.codecs.vardct.num_ac_contexts();
                let max_num_bits =
                    self.codecs
                        .vardct
                        .decode_pass_histograms(pass, num_contexts, br)?;
                max_num_bits_ac = max_num_bits_ac.max(max_num_bits);
            }
            max_num_bits_ac += self.header.passes.num_passes.ceil_log2();
            // 16-bit storage is not implemented for JPEG output, and 16 is
            // excluded for safety.
            let use_16_bit = max_num_bits_ac < 16 && !self.bundle.is_jpeg();
            let store = self.header.passes.num_passes > 1;
            self.codecs.vardct.allocate_coefficients(
                if use_16_bit {
                    CoeffPrecision::I16
                } else {
                    CoeffPrecision::I32
                },
                if store { self.frame_dim.num_groups } else { 0 },
                store,
            )?;
        }

        if self.bundle.is_jpeg() {
            let (qtable, qtable_den) = self
                .codecs
                .vardct
                .raw_quant_table()
                .ok_or(Error::NotAJpegQuantTable)?;
            if (qtable_den - JPEG_QUANT_DENOMINATOR).abs() > 1e-8 {
                return Err(Error::NotAJpegQuantTable);
            }
            let do_ycbcr = self.header.do_ycbcr;
            let jpeg = self.bundle.jpeg.as_mut().unwrap();
            jpeg.is_ycbcr = do_ycbcr;
            let num_components = jpeg.components.len();
            let is_gray = num_components == 1;
            let component_order = jpeg_order(do_ycbcr, is_gray);
            let mut qt_set = 0u32;
            for (c, &component_idx) in component_order.iter().enumerate().take(num_components) {
                let quant_c = if is_gray { 1 } else { c };
                let qpos = jpeg.components[component_idx].quant_idx;
                if qpos >= jpeg.quant.len() || qpos >= 32 {
                    return Err(Error::InvalidJpegComponent);
                }
                qt_set |= 1 << qpos;
                // The raw table is stored (x, y); JPEG wants (y, x).
                for x in 0..8 {
                    for y in 0..8 {
                        jpeg.quant[qpos].values[x * 8 + y] = qtable[quant_c * 64 + y * 8 + x];
                    }
                }
            }
            for i in 0..jpeg.quant.len() {
                if i < 32 && qt_set & (1u32 << i) != 0 {
                    continue;
                }
                if i == 0 {
                    return Err(Error::FirstQuantTableUnused);
                }
                // An unused quant table is a copy of the previous one.
                jpeg.quant[i].values = jpeg.quant[i - 1].values;
            }
        }
        self.decoded_ac_global = true;
        Ok(())
    }

    /// Decodes `readers.len()` new AC passes of one group. With
    /// `force_draw`, missing passes are zero-filled so the group can be
    /// rendered from whatever is present.
    fn process_ac_group(
        &self,
        group: usize,
        readers: &mut [BitReader<'_>],
        first_pass: usize,
        force_draw: bool,
        dc_only: bool,
        thread: usize,
    ) -> Result<()> {
        debug!(group, first_pass, num_new = readers.len(), force_draw, "processing AC group");
        let num_new_passes = readers.len();
        let mut should_run_pipeline = true;
        if self.header.encoding == Encoding::VarDCT {
            should_run_pipeline = self.codecs.vardct.decode_ac_group(
                group, readers, first_pass, force_draw, dc_only, thread,
            )?;
        }

        let group_dim = self.frame_dim.group_dim;
        let gx = group % self.frame_dim.xsize_groups;
        let gy = group / self.frame_dim.xsize_groups;
        // Not limited to the image dimensions here; the stream decoder
        // clips.
        let rect = Rect {
            origin: (gx * group_dim, gy * group_dim),
            size: (group_dim, group_dim),
        };
        for pass in 0..self.header.passes.num_passes as usize {
            let shift = self.header.passes.downsampling_bracket(pass);
            if pass >= first_pass && pass < first_pass + num_new_passes {
                self.codecs.modular.decode_stream(
                    ModularStreamId::ModularAc { group, pass },
                    rect,
                    shift,
                    Some(&mut readers[pass - first_pass]),
                    self.allow_partial_frames,
                )?;
            } else if pass >= first_pass + num_new_passes && force_draw {
                self.codecs.modular.decode_stream(
                    ModularStreamId::ModularAc { group, pass },
                    rect,
                    shift,
                    None,
                    self.allow_partial_frames,
                )?;
            }
        }

        if self.header.has_noise() {
            self.draw_group_noise(group)?;
        }

        if !self.codecs.modular.uses_full_image() && !self.bundle.is_jpeg() && should_run_pipeline {
            self.codecs.pipeline.commit_group(group, thread)?;
        }
        Ok(())
    }

    /// Deterministic noise tiles for the colour channels of one group, over
    /// an `upsampling x upsampling` tile grid.
    fn draw_group_noise(&self, group: usize) -> Result<()> {
        let group_dim = self.frame_dim.group_dim;
        let upsampling = self.header.upsampling as usize;
        let gx = group % self.frame_dim.xsize_groups;
        let gy = group / self.frame_dim.xsize_groups;
        let upsampled = (
            self.frame_dim.xsize_upsampled,
            self.frame_dim.ysize_upsampled,
        );

        let buf_x0 = gx * upsampling * group_dim;
        let buf_y0 = gy * upsampling * group_dim;
        let buf_xsize = ((gx + 1) * upsampling * group_dim).min(upsampled.0) - buf_x0;
        let buf_ysize = ((gy + 1) * upsampling * group_dim).min(upsampled.1) - buf_y0;
        let mut planes = [
            Image::new((buf_xsize, buf_ysize))?,
            Image::new((buf_xsize, buf_ysize))?,
            Image::new((buf_xsize, buf_ysize))?,
        ];

        for iy in 0..upsampling {
            for ix in 0..upsampling {
                // Each subregion reseeds the generator from its own origin.
                let x0 = ((gx * upsampling + ix) * group_dim) as u32;
                let y0 = ((gy * upsampling + iy) * group_dim) as u32;
                let sub_x0 = ix * group_dim;
                let sub_y0 = iy * group_dim;
                let sub_xsize = ((ix + 1) * group_dim).min(buf_xsize).saturating_sub(sub_x0);
                let sub_ysize = ((iy + 1) * group_dim).min(buf_ysize).saturating_sub(sub_y0);
                if sub_xsize == 0 || sub_ysize == 0 {
                    continue;
                }
                random3planes(
                    self.state.visible_frame_index,
                    self.state.nonvisible_frame_index,
                    x0,
                    y0,
                    Rect {
                        origin: (sub_x0, sub_y0),
                        size: (sub_xsize, sub_ysize),
                    },
                    &mut planes,
                );
            }
        }
        self.codecs.pipeline.set_group_noise(group, planes)
    }

    /// Renders the best-effort current state: under-decoded groups are
    /// force-drawn with zero-filled AC. Returns `false` when the frame
    /// cannot be composed yet (blending before finalization).
    pub fn flush(&mut self) -> Result<bool> {
        let mut has_blending = self.header.blending_info.mode != BlendMode::Replace
            || self.header.custom_size_or_origin;
        for ec in &self.header.ec_blending_info {
            if ec.mode != BlendMode::Replace {
                has_blending = true;
            }
        }
        // No early flush if blending is enabled: composing against the
        // background is only safe once.
        if has_blending && !self.is_finalized {
            return Ok(false);
        }
        // Nothing to do early for a skip-progressive frame.
        if self.header.frame_type == FrameType::SkipProgressive && !self.is_finalized {
            return Ok(true);
        }
        if self.bundle.is_jpeg() {
            return Ok(true);
        }
        self.allocate_output()?;

        let num_passes = self.header.passes.num_passes;
        let completely_decoded_ac_pass = self
            .decoded_passes_per_ac_group
            .iter()
            .copied()
            .min()
            .unwrap_or(0);
        if completely_decoded_ac_pass < num_passes {
            // We don't have all AC yet: force a draw of the missing areas.
            for (g, &passes) in self.decoded_passes_per_ac_group.iter().enumerate() {
                if passes == num_passes {
                    continue;
                }
                self.codecs.pipeline.clear_done(g);
            }
            let mut tasks: Vec<ForceDrawTask> = self
                .decoded_passes_per_ac_group
                .iter()
                .enumerate()
                .filter(|&(_, &passes)| passes != num_passes)
                .map(|(group, &passes)| ForceDrawTask {
                    group,
                    first_pass: passes as usize,
                })
                .collect();
            let dc_only = !self.decoded_ac_global;
            let results = self.pool.run(
                &mut tasks,
                |num_threads| {
                    self.codecs.vardct.prepare_storage(num_threads)?;
                    self.codecs.pipeline.prepare(num_threads)
                },
                |_, thread, task| {
                    self.process_ac_group(
                        task.group,
                        &mut [],
                        task.first_pass,
                        /*force_draw=*/ true,
                        dc_only,
                        thread,
                    )
                },
                "ForceDrawGroup",
            )?;
            let mut failed = false;
            for (task, result) in tasks.iter().zip(results) {
                if let Err(e) = result {
                    warn!(group = task.group, "force-draw failed: {e}");
                    failed = true;
                }
            }
            if failed {
                return Err(Error::DrawingGroupsFailed);
            }
        }

        // Undo global modular transforms and convert integer planes to the
        // float image bundle.
        self.codecs
            .modular
            .finalize(&mut self.bundle, self.is_finalized)?;

        self.num_renders += 1;
        Ok(true)
    }
}
