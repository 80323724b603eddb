use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    #[inline]
    pub fn as_vector(&self) -> na::Vector4<f32> {
        na::Vector4::from(self.0)
    }

    #[inline]
    fn from_vector(v: na::Vector4<f32>) -> Self {
        BBox([v[0], v[1], v[2], v[3]], PhantomData)
    }

    /// Linear blend of all four components, `factor = 0` gives `self`.
    pub fn lerp(&self, other: &Self, factor: f32) -> Self {
        let a = self.as_vector();
        let b = other.as_vector();

        Self::from_vector(a + (b - a) * factor)
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn with_left(mut self, left: f32) -> Self {
        self.0[0] = left;
        self
    }

    #[inline]
    pub fn with_top(mut self, top: f32) -> Self {
        self.0[1] = top;
        self
    }

    #[inline]
    pub fn with_width(mut self, width: f32) -> Self {
        self.0[2] = width;
        self
    }

    #[inline]
    pub fn with_height(mut self, height: f32) -> Self {
        self.0[3] = height;
        self
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    /// Swaps corners so that left <= right and top <= bottom.
    /// A rectangle dragged toward the origin arrives with them inverted.
    pub fn normalized(&self) -> Self {
        BBox::ltrb(
            self.left().min(self.right()),
            self.top().min(self.bottom()),
            self.left().max(self.right()),
            self.top().max(self.bottom()),
        )
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self([v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]], PhantomData)
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self([v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]], PhantomData)
    }
}
