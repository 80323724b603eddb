use crate::bbox::{BBox, Ltwh};
use num_traits::Float;

/// Rounds to `precision` decimal places.
#[inline]
pub fn round_to<T: Float>(value: T, precision: usize) -> T {
    let scale = T::from(10.0_f64.powi(precision as i32)).unwrap_or_else(T::one);

    (value * scale).round() / scale
}

/// Boxes for every frame strictly between two keyframes, in chronological
/// order. The keyframes may be given in either order. Returns `None` when
/// no frame lies between them.
pub fn interpolate_boxes(
    (frame_a, box_a): (u32, &BBox<Ltwh>),
    (frame_b, box_b): (u32, &BBox<Ltwh>),
) -> Option<Vec<(u32, BBox<Ltwh>)>> {
    let ((start, from), (end, to)) = if frame_a <= frame_b {
        ((frame_a, box_a), (frame_b, box_b))
    } else {
        ((frame_b, box_b), (frame_a, box_a))
    };

    let span = end - start;
    if span < 2 {
        return None;
    }

    let steps = (1..span)
        .map(|t| {
            let factor = t as f32 / span as f32;
            (start + t, from.lerp(to, factor))
        })
        .collect();

    Some(steps)
}
