// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Data-parallel execution over per-group work items.
//!
//! Stages hand each worker exclusive ownership of one work item; shared
//! decoder state is only ever read inside workers. Failures are collected
//! into a per-item result vector that the caller joins at the barrier, so
//! the scheduler both learns *which* item failed (for logging) and can
//! collapse the stage to its canonical error.

use crate::error::Result;
use crate::util::tracing_wrappers::*;

/// Runs work items on the rayon pool when the `parallel` feature is enabled,
/// sequentially otherwise. Thread ids passed to `body` are dense in
/// `[0, num_threads())` and index per-thread scratch owned by the
/// collaborating sub-decoders.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPool {}

impl ThreadPool {
    pub fn new() -> Self {
        Self {}
    }

    pub fn num_threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            rayon::current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Runs `body(index, thread, item)` for every item. `init` runs once
    /// before any work item, with the number of threads that may
    /// participate. Returns one result per item; the items all run even if
    /// some fail.
    pub fn run<T, I, B>(
        &self,
        items: &mut [T],
        init: I,
        body: B,
        label: &'static str,
    ) -> Result<Vec<Result<()>>>
    where
        T: Send,
        I: FnOnce(usize) -> Result<()>,
        B: Fn(usize, usize, &mut T) -> Result<()> + Send + Sync,
    {
        debug!(label, num_items = items.len(), "running parallel stage");
        init(self.num_threads())?;
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            Ok(items
                .par_iter_mut()
                .enumerate()
                .map(|(i, item)| body(i, rayon::current_thread_index().unwrap_or(0), item))
                .collect())
        }
        #[cfg(not(feature = "parallel"))]
        {
            Ok(items
                .iter_mut()
                .enumerate()
                .map(|(i, item)| body(i, 0, item))
                .collect())
        }
    }
}
