//! 二维数组上的数值图像处理原语.
//!
//! 边界模式、原点位置等细节与 `scipy.ndimage` / MATLAB `imfilter`
//! 的对应函数一致, 因为上层算法的参数都是按这些语义调好的.

mod conv;
mod interp;
mod iter;
mod morph;
mod stats;

pub use conv::{convolve_nearest, correlate_same_zero, correlate_valid, gradient, kernel_from_fn};
pub use interp::{bicubic_at, bilinear_at, rescale_bilinear, rescale_mask};
pub use iter::{neighbour8, PosIter};
pub use morph::binary_closing_2x2;
pub use stats::{argmax_first, argmin_first, median, positive_median};

use ndarray::{Array2, ArrayView2};

/// `image * mask`, 掩膜外的像素置 0.
pub fn apply_mask(image: ArrayView2<f64>, mask: ArrayView2<bool>) -> Array2<f64> {
    let mut out = image.to_owned();
    out.zip_mut_with(&mask, |v, &m| {
        if !m {
            *v = 0.0;
        }
    });
    out
}

/// 0/1 二值图.
#[inline]
pub fn bool_to_f64(mask: ArrayView2<bool>) -> Array2<f64> {
    mask.mapv(|v| v as u8 as f64)
}
