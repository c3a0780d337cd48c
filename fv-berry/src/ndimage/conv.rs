//! 卷积与相关.

use ndarray::{Array2, ArrayView2, Axis, Zip};

/// 在 `[-half, half]²` 的网格上生成核, `f(x, y)` 中 `x` 为列偏移, `y` 为行偏移.
pub fn kernel_from_fn<F>(half: usize, f: F) -> Array2<f64>
where
    F: Fn(f64, f64) -> f64,
{
    let size = 2 * half + 1;
    Array2::from_shape_fn((size, size), |(r, c)| {
        f(c as f64 - half as f64, r as f64 - half as f64)
    })
}

#[inline]
fn clamp_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

/// 卷积, 输出与输入同形. 边界按最近像素延拓, 与
/// `scipy.ndimage.convolve(input, kernel, mode='nearest')` 一致:
///
/// `out[r, c] = Σ k[a, b] · in[r + kh/2 - a, c + kw/2 - b]`.
pub fn convolve_nearest(input: ArrayView2<f64>, kernel: ArrayView2<f64>) -> Array2<f64> {
    let (h, w) = input.dim();
    let (kh, kw) = kernel.dim();
    let mut out = Array2::zeros((h, w));
    if h == 0 || w == 0 {
        return out;
    }
    let (oh, ow) = ((kh / 2) as isize, (kw / 2) as isize);
    for ((r, c), o) in out.indexed_iter_mut() {
        let mut acc = 0.0;
        for ((a, b), &k) in kernel.indexed_iter() {
            if k == 0.0 {
                continue;
            }
            let y = clamp_index(r as isize + oh - a as isize, h);
            let x = clamp_index(c as isize + ow - b as isize, w);
            acc += k * input[[y, x]];
        }
        *o = acc;
    }
    out
}

/// 相关, 输出与输入同形, 边界外按 0 处理. 与 MATLAB
/// `imfilter(input, kernel, 0, 'same', 'corr')` 一致:
///
/// `out[r, c] = Σ k[a, b] · in[r + a - (kh-1)/2, c + b - (kw-1)/2]`.
pub fn correlate_same_zero(input: ArrayView2<f64>, kernel: ArrayView2<f64>) -> Array2<f64> {
    let (h, w) = input.dim();
    let (kh, kw) = kernel.dim();
    let (oh, ow) = (((kh.max(1) - 1) / 2) as isize, ((kw.max(1) - 1) / 2) as isize);
    let mut out = Array2::zeros((h, w));
    for ((r, c), o) in out.indexed_iter_mut() {
        let mut acc = 0.0;
        for ((a, b), &k) in kernel.indexed_iter() {
            let y = r as isize + a as isize - oh;
            let x = c as isize + b as isize - ow;
            if y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w {
                acc += k * input[[y as usize, x as usize]];
            }
        }
        *o = acc;
    }
    out
}

/// `valid` 模式相关: 模板完全落在输入内部的所有位置,
/// 输出形状 `(H - h + 1, W - w + 1)`. 模板大于输入时输出为空.
pub fn correlate_valid(input: ArrayView2<f64>, template: ArrayView2<f64>) -> Array2<f64> {
    let (ih, iw) = input.dim();
    let (th, tw) = template.dim();
    if th == 0 || tw == 0 || th > ih || tw > iw {
        return Array2::zeros((0, 0));
    }
    let (oh, ow) = (ih - th + 1, iw - tw + 1);
    let data = input
        .windows((th, tw))
        .into_iter()
        .map(|win| {
            Zip::from(&win)
                .and(&template)
                .fold(0.0, |acc, &a, &b| acc + a * b)
        })
        .collect();
    Array2::from_shape_vec((oh, ow), data).unwrap_or_else(|_| Array2::zeros((oh, ow)))
}

/// 沿 `axis` 的数值梯度, 与 `numpy.gradient` 一致: 内部用中心差分,
/// 两端用单边差分. 该轴长度小于 2 时梯度为 0.
pub fn gradient(input: ArrayView2<f64>, axis: Axis) -> Array2<f64> {
    let mut out = Array2::zeros(input.raw_dim());
    let n = input.len_of(axis);
    if n < 2 {
        return out;
    }
    for (src, mut dst) in input.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        dst[0] = src[1] - src[0];
        dst[n - 1] = src[n - 1] - src[n - 2];
        for i in 1..n - 1 {
            dst[i] = (src[i + 1] - src[i - 1]) / 2.0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_convolve_nearest_odd() {
        let input = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        // 1x3 核 [1, 0, -1] 的卷积即 in[c+1] - in[c-1] (边界取最近像素).
        let kernel = array![[1.0, 0.0, -1.0]];
        let out = convolve_nearest(input.view(), kernel.view());
        assert_eq!(out, array![[1.0, 2.0, 1.0], [1.0, 2.0, 1.0]]);
    }

    #[test]
    fn test_convolve_nearest_even() {
        let input = array![[1.0], [2.0], [4.0], [8.0]];
        // 偶数核: out[r] = k0 * in[r+1] + k1 * in[r].
        let kernel = array![[1.0], [-1.0]];
        let out = convolve_nearest(input.view(), kernel.view());
        assert_eq!(out, array![[1.0], [2.0], [4.0], [0.0]]);
    }

    #[test]
    fn test_correlate_same_zero() {
        let input = array![[1.0, 2.0, 3.0]];
        let kernel = array![[1.0, 0.0, -1.0]];
        let out = correlate_same_zero(input.view(), kernel.view());
        // out[c] = in[c-1] - in[c+1].
        assert_eq!(out, array![[-2.0, -2.0, 2.0]]);
    }

    #[test]
    fn test_correlate_valid() {
        let input = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let template = array![[1.0, 0.0], [0.0, 1.0]];
        let out = correlate_valid(input.view(), template.view());
        assert_eq!(out, array![[6.0, 8.0], [12.0, 14.0]]);

        let big = Array2::<f64>::ones((4, 4));
        assert_eq!(correlate_valid(input.view(), big.view()).dim(), (0, 0));
    }

    #[test]
    fn test_gradient() {
        let input = array![[1.0, 2.0, 4.0, 7.0]];
        let gx = gradient(input.view(), Axis(1));
        assert_eq!(gx, array![[1.0, 1.5, 2.5, 3.0]]);
        let gy = gradient(input.view(), Axis(0));
        assert!(gy.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_kernel_from_fn() {
        let k = kernel_from_fn(1, |x, y| x + 10.0 * y);
        assert_eq!(k[[0, 0]], -11.0);
        assert_eq!(k[[1, 2]], 1.0);
        assert_eq!(k[[2, 1]], 10.0);
    }
}
