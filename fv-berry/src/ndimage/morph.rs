//! 二值形态学.

use ndarray::{Array2, ArrayView2};

/// 以 2x2 全 1 结构元做闭运算 (先膨胀后腐蚀), 与
/// `scipy.ndimage.binary_closing(mask, structure=np.ones((2, 2)))` 一致.
///
/// 偶数尺寸结构元的原点在 `(1, 1)`:
///
/// 1. 膨胀 `D[r, c] = ∨ mask[r..=r+1, c..=c+1]`, 越界视为背景;
/// 2. 腐蚀 `E[r, c] = ∧ D[r-1..=r, c-1..=c]`, 越界视为背景,
///   因此第 0 行和第 0 列总是背景.
pub fn binary_closing_2x2(mask: ArrayView2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    let get = |a: &ArrayView2<bool>, r: usize, c: usize| r < h && c < w && a[[r, c]];

    let dilated = Array2::from_shape_fn((h, w), |(r, c)| {
        get(&mask, r, c) || get(&mask, r + 1, c) || get(&mask, r, c + 1) || get(&mask, r + 1, c + 1)
    });
    let d = dilated.view();
    Array2::from_shape_fn((h, w), |(r, c)| {
        r >= 1
            && c >= 1
            && get(&d, r, c)
            && get(&d, r - 1, c)
            && get(&d, r, c - 1)
            && get(&d, r - 1, c - 1)
    })
}
