// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod log2;
mod rng;
#[cfg(test)]
pub mod test;
pub mod tracing_wrappers;

pub use log2::*;
pub use rng::*;
