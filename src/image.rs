// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::{Error, Result};

mod private {
    pub trait Sealed {}
}

pub trait ImageDataType:
    private::Sealed + Copy + Default + Debug + PartialEq + Send + Sync + 'static
{
    #[cfg(test)]
    fn random<R: rand::Rng>(rng: &mut R) -> Self;
}

macro_rules! impl_image_data_type {
    ($ty: ty) => {
        impl private::Sealed for $ty {}
        impl ImageDataType for $ty {
            #[cfg(test)]
            fn random<R: rand::Rng>(rng: &mut R) -> Self {
                rng.r#gen()
            }
        }
    };
}

impl_image_data_type!(u8);
impl_image_data_type!(u16);
impl_image_data_type!(u32);
impl_image_data_type!(i16);
impl_image_data_type!(i32);
impl_image_data_type!(f32);

/// A rectangle within an image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub origin: (usize, usize),
    pub size: (usize, usize),
}

impl Rect {
    pub fn x1(&self) -> usize {
        self.origin.0 + self.size.0
    }
    pub fn y1(&self) -> usize {
        self.origin.1 + self.size.1
    }
}

/// A single plane of typed samples.
#[derive(Clone, PartialEq)]
pub struct Image<T: ImageDataType> {
    size: (usize, usize),
    data: Vec<T>,
}

impl<T: ImageDataType> Debug for Image<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image<{}x{}>", self.size.0, self.size.1)
    }
}

impl<T: ImageDataType> Image<T> {
    pub fn new(size: (usize, usize)) -> Result<Image<T>> {
        let total = size
            .0
            .checked_mul(size.1)
            .ok_or(Error::ImageSizeTooLarge(size.0, size.1))?;
        let mut data = Vec::new();
        data.try_reserve_exact(total)?;
        data.resize(total, T::default());
        Ok(Image { size, data })
    }

    pub fn new_with_value(size: (usize, usize), value: T) -> Result<Image<T>> {
        let mut img = Self::new(size)?;
        img.fill(value);
        Ok(img)
    }

    #[cfg(test)]
    pub fn new_random<R: rand::Rng>(size: (usize, usize), rng: &mut R) -> Result<Image<T>> {
        let mut img = Self::new(size)?;
        img.data.iter_mut().for_each(|x| *x = T::random(rng));
        Ok(img)
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.size.1);
        &self.data[row * self.size.0..(row + 1) * self.size.0]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(row < self.size.1);
        &mut self.data[row * self.size.0..(row + 1) * self.size.0]
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn try_clone(&self) -> Result<Image<T>> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Image {
            size: self.size,
            data,
        })
    }
}
