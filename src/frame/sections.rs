// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Section classification and per-section bit-reader views.

use std::cell::Cell;

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    frame::{FrameDecoder, SectionStatus},
    headers::frame_header::Encoding,
    util::tracing_wrappers::*,
};

/// One entry of a section batch: the section id and a reader over exactly
/// that section's bytes.
#[derive(Debug)]
pub struct SectionInfo<'a> {
    pub id: usize,
    pub br: BitReader<'a>,
}

impl SectionInfo<'_> {
    /// Bits of the section window that were never consumed.
    pub fn unconsumed_bits(&self) -> usize {
        self.br.total_bits_available()
    }
}

/// Role of a section id within the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    DcGlobal,
    DcGroup(usize),
    AcGlobal,
    AcGroup { group: usize, pass: usize },
}

/// Classifies a section id. Ids beyond the AC groups of the last declared
/// pass are a hard format error.
pub fn classify_section(
    id: usize,
    num_dc_groups: usize,
    num_groups: usize,
    num_passes: usize,
) -> Result<SectionKind> {
    let ac_global_index = num_dc_groups + 1;
    if id == 0 {
        Ok(SectionKind::DcGlobal)
    } else if id < ac_global_index {
        Ok(SectionKind::DcGroup(id - 1))
    } else if id == ac_global_index {
        Ok(SectionKind::AcGlobal)
    } else {
        let ac_idx = id - ac_global_index - 1;
        if ac_idx >= num_groups * num_passes {
            return Err(Error::InvalidSectionId);
        }
        Ok(SectionKind::AcGroup {
            group: ac_idx % num_groups,
            pass: ac_idx / num_groups,
        })
    }
}

impl FrameDecoder {
    /// Carves a bounded sub-reader out of the parent for each section of the
    /// TOC. The parent must be positioned at the end of the TOC and is
    /// advanced past the section data.
    ///
    /// With `allow_more_progressive_steps`, the DC-global window (and, for
    /// modular frames, every window) only needs to *start* inside the
    /// available bytes and is truncated to them, possibly to zero length.
    /// Sections that are not available are omitted when
    /// `allow_partial_files` is set and are an error otherwise.
    pub fn sections<'a>(
        &self,
        br: &mut BitReader<'a>,
        allow_more_progressive_steps: bool,
        allow_partial_files: bool,
    ) -> Result<Vec<SectionInfo<'a>>> {
        debug_assert_eq!(br.total_bits_read() % 8, 0);
        let pos = br.total_bits_read() / 8;
        let total = br.total_bytes();
        let view = br.view();
        let mut out = Vec::with_capacity(self.num_sections());
        let mut bytes_to_skip = 0usize;
        for i in 0..self.num_sections() {
            let b = self.section_offsets()[i] as usize;
            let e = b + self.section_sizes()[i] as usize;
            bytes_to_skip += e - b;
            let lenient = allow_more_progressive_steps
                && (i == 0 || self.header().encoding == Encoding::Modular);
            let needed_end = if lenient { b } else { e };
            if pos + needed_end <= total || (i == 0 && allow_more_progressive_steps) {
                let len = if pos + b > total {
                    0
                } else {
                    (total - pos - b).min(e - b)
                };
                let start = (pos + b).min(total);
                out.push(SectionInfo {
                    id: i,
                    br: BitReader::new(&view[start..start + len]),
                });
            } else if !allow_partial_files {
                return Err(Error::PrematureEndOfStream);
            }
        }
        // Skip over the to-be-decoded sections.
        let available = br.total_bits_available() / 8;
        br.skip_bits(8 * bytes_to_skip.min(available))?;
        Ok(out)
    }
}

/// The error a batch of [`SectionCloser`]-guarded sections observed at drop
/// time. Drop cannot fail, so the closer records the first offender here
/// and the caller converts it once the batch scope has ended.
#[derive(Default)]
pub struct CloseVerdict(Cell<Option<(usize, usize)>>);

impl CloseVerdict {
    /// First section dropped with unconsumed bits, as `(id, bits_left)`.
    pub fn first_leftover(&self) -> Option<(usize, usize)> {
        self.0.get()
    }

    /// The scoped-closer verdict: a lint-like warning was already emitted at
    /// drop time; in release builds the leftover is a hard error.
    pub fn check(&self) -> Result<()> {
        match self.0.get() {
            Some((id, left)) if !cfg!(debug_assertions) => Err(Error::SectionNotConsumed(id, left)),
            _ => Ok(()),
        }
    }
}

/// Scoped closer for a section batch: on any exit path, asserts at drop
/// that every section that reached `Done` was consumed to its declared end,
/// recording offenders into the shared [`CloseVerdict`].
pub struct SectionCloser<'a, 'v> {
    pub sections: Vec<SectionInfo<'a>>,
    pub status: Vec<SectionStatus>,
    verdict: &'v CloseVerdict,
}

impl<'a, 'v> SectionCloser<'a, 'v> {
    pub fn new(sections: Vec<SectionInfo<'a>>, verdict: &'v CloseVerdict) -> Self {
        let status = vec![SectionStatus::Skipped; sections.len()];
        Self {
            sections,
            status,
            verdict,
        }
    }
}

impl Drop for SectionCloser<'_, '_> {
    fn drop(&mut self) {
        for (section, &status) in self.sections.iter().zip(self.status.iter()) {
            if status != SectionStatus::Done {
                continue;
            }
            let left = section.unconsumed_bits();
            if left > 0 {
                warn!(section = section.id, left, "section not fully consumed");
                if self.verdict.0.get().is_none() {
                    self.verdict.0.set(Some((section.id, left)));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_matches_toc_layout() {
        // 2 DC groups, 3 AC groups, 2 passes.
        let (d, g, p) = (2, 3, 2);
        assert_eq!(classify_section(0, d, g, p).unwrap(), SectionKind::DcGlobal);
        assert_eq!(
            classify_section(1, d, g, p).unwrap(),
            SectionKind::DcGroup(0)
        );
        assert_eq!(
            classify_section(2, d, g, p).unwrap(),
            SectionKind::DcGroup(1)
        );
        assert_eq!(classify_section(3, d, g, p).unwrap(), SectionKind::AcGlobal);
        assert_eq!(
            classify_section(4, d, g, p).unwrap(),
            SectionKind::AcGroup { group: 0, pass: 0 }
        );
        assert_eq!(
            classify_section(6, d, g, p).unwrap(),
            SectionKind::AcGroup { group: 2, pass: 0 }
        );
        assert_eq!(
            classify_section(7, d, g, p).unwrap(),
            SectionKind::AcGroup { group: 0, pass: 1 }
        );
        assert_eq!(
            classify_section(9, d, g, p).unwrap(),
            SectionKind::AcGroup { group: 2, pass: 1 }
        );
        assert!(matches!(
            classify_section(10, d, g, p),
            Err(Error::InvalidSectionId)
        ));
    }

    #[test]
    fn closer_accepts_consumed_and_skipped_sections() {
        let data = [0u8; 4];
        let verdict = CloseVerdict::default();
        {
            let mut closer = SectionCloser::new(
                vec![
                    SectionInfo {
                        id: 0,
                        br: BitReader::new(&data),
                    },
                    SectionInfo {
                        id: 1,
                        br: BitReader::new(&data),
                    },
                ],
                &verdict,
            );
            closer.sections[0].br.skip_bits(32).unwrap();
            closer.status[0] = SectionStatus::Done;
            // Unconsumed bytes in a skipped section are expected.
            closer.status[1] = SectionStatus::Skipped;
        }
        assert_eq!(verdict.first_leftover(), None);
        assert!(verdict.check().is_ok());
    }

    #[test]
    fn closer_records_leftover_bits_on_any_exit() {
        let data = [0u8; 4];
        let verdict = CloseVerdict::default();
        let early_exit = || -> Result<()> {
            let mut closer = SectionCloser::new(
                vec![SectionInfo {
                    id: 7,
                    br: BitReader::new(&data),
                }],
                &verdict,
            );
            closer.sections[0].br.skip_bits(16).unwrap();
            closer.status[0] = SectionStatus::Done;
            // An error path drops the closer before any explicit check.
            Err(Error::OutOfBounds)
        };
        assert!(early_exit().is_err());
        assert_eq!(verdict.first_leftover(), Some((7, 16)));
    }
}
