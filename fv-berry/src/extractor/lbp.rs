//! 分块局部二值模式 (LBP) 直方图.

use log::debug;
use ndarray::{s, Array1, Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Extract, Feature};
use crate::consts::extract::{LBP_BLOCK_OVERLAP, LBP_BLOCK_SIZE, LBP_NEIGHBORS, LBP_RADIUS};
use crate::consts::gray::MAX_F64;
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::ndimage::{apply_mask, PosIter};

/// 可以查表的最大邻居数. 更多邻居时只支持 uniform 类的映射.
const MAX_TABLE_NEIGHBORS: usize = 16;

/// LBP 编码到直方图 bin 的映射方式.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LbpMapping {
    /// 原始编码, `2^P` 个 bin.
    Plain,
    /// uniform 模式各占一个 bin, 其余共用一个, `P(P-1) + 3` 个 bin.
    Uniform,
    /// 旋转不变: 所有旋转等价的编码共用一个 bin.
    RotationInvariant,
    /// 旋转不变 uniform: 按 1 的个数分 bin, 非 uniform 共用一个, `P + 2` 个 bin.
    RotationInvariantUniform,
}

/// 编码到 bin 下标的映射表.
#[derive(Clone, Debug)]
struct LabelTable {
    mapping: LbpMapping,
    p: usize,
    /// 仅 `RotationInvariant` 使用.
    table: Vec<u32>,
    bins: usize,
}

impl LabelTable {
    fn new(mapping: LbpMapping, p: usize) -> Self {
        let (table, bins) = match mapping {
            LbpMapping::Plain => (Vec::new(), 1 << p),
            LbpMapping::Uniform => (Vec::new(), p * (p - 1) + 3),
            LbpMapping::RotationInvariantUniform => (Vec::new(), p + 2),
            LbpMapping::RotationInvariant => {
                let n = 1_u64 << p;
                let mut ids = vec![u32::MAX; n as usize];
                let mut next = 0;
                // 升序遍历时, 每个等价类的代表元 (最小旋转) 总是最先出现.
                for code in 0..n {
                    let rep = min_rotation(code, p);
                    if rep == code {
                        ids[code as usize] = next;
                        next += 1;
                    }
                }
                let table = (0..n).map(|code| ids[min_rotation(code, p) as usize]).collect();
                (table, next as usize)
            }
        };
        Self {
            mapping,
            p,
            table,
            bins,
        }
    }

    #[inline]
    fn label(&self, code: u64) -> usize {
        let p = self.p;
        match self.mapping {
            LbpMapping::Plain => code as usize,
            LbpMapping::RotationInvariant => self.table[code as usize] as usize,
            LbpMapping::Uniform => {
                let ones = code.count_ones() as usize;
                if transitions(code, p) > 2 {
                    p * (p - 1) + 2
                } else if ones == 0 {
                    0
                } else if ones == p {
                    p * (p - 1) + 1
                } else {
                    // 1 的连续段的起点: 该位为 1 且 (循环意义下) 前一位为 0.
                    let start = (0..p)
                        .find(|&i| (code >> i) & 1 == 1 && (code >> ((i + p - 1) % p)) & 1 == 0)
                        .unwrap_or(0);
                    1 + (ones - 1) * p + start
                }
            }
            LbpMapping::RotationInvariantUniform => {
                if transitions(code, p) > 2 {
                    p + 1
                } else {
                    code.count_ones() as usize
                }
            }
        }
    }
}

#[inline]
fn full_mask(p: usize) -> u64 {
    if p >= 64 {
        u64::MAX
    } else {
        (1 << p) - 1
    }
}

/// 在 `p` 位内循环左移一位.
#[inline]
fn rotate_left(code: u64, p: usize) -> u64 {
    ((code << 1) | (code >> (p - 1))) & full_mask(p)
}

/// 循环意义下相邻位的跳变次数.
#[inline]
fn transitions(code: u64, p: usize) -> u32 {
    (code ^ rotate_left(code, p)).count_ones()
}

/// 所有循环移位中的最小值.
fn min_rotation(code: u64, p: usize) -> u64 {
    let mut best = code;
    let mut cur = code;
    for _ in 1..p {
        cur = rotate_left(cur, p);
        best = best.min(cur);
    }
    best
}

/// 以块为周期的双线性插值.
#[inline]
fn sample_wrapped(block: &ArrayView2<f64>, y: f64, x: f64) -> f64 {
    let (h, w) = block.dim();
    let (y0, x0) = (y.floor(), x.floor());
    let (fy, fx) = (y - y0, x - x0);
    let wrap = |v: f64, n: usize| (v as isize).rem_euclid(n as isize) as usize;
    let (r0, r1) = (wrap(y0, h), wrap(y0 + 1.0, h));
    let (c0, c1) = (wrap(x0, w), wrap(x0 + 1.0, w));
    let top = block[[r0, c0]] * (1.0 - fx) + block[[r0, c1]] * fx;
    let bottom = block[[r1, c0]] * (1.0 - fx) + block[[r1, c1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// 把非常接近整数的偏移量取整, 使轴向上的邻居不经插值直接取像素.
#[inline]
fn snap(v: f64) -> f64 {
    if (v - v.round()).abs() < 1e-9 {
        v.round()
    } else {
        v
    }
}

/// 分块 LBP 直方图.
///
/// 图像先乘以掩膜并缩放到 `[0, 1]`, 再按行优先顺序切成大小为 `block_size`、
/// 步长为 `block_size - block_overlap` 的方块. 每块独立计算 LBP
/// (邻居越过块边界时循环回绕), 直方图归一化到和为 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LocalBinaryPatterns {
    /// 方块边长.
    pub block_size: usize,
    /// 相邻方块的重叠量.
    pub block_overlap: usize,
    /// 邻居到中心的距离.
    pub radius: usize,
    /// 邻居个数.
    pub neighbors: usize,
    /// 使用 uniform 映射.
    pub uniform: bool,
    /// 邻居分布在圆上 (需插值); 否则分布在方框上.
    pub circular: bool,
    /// 使用旋转不变映射.
    pub rotation_invariant: bool,
    /// 与邻域 (含中心) 均值而不是中心比较.
    pub compare_to_average: bool,
    /// 输出稀疏直方图.
    pub sparse_histogram: bool,
    /// 每个方块单独一行输出.
    pub split_histogram: bool,
}

impl Default for LocalBinaryPatterns {
    fn default() -> Self {
        Self {
            block_size: LBP_BLOCK_SIZE,
            block_overlap: LBP_BLOCK_OVERLAP,
            radius: LBP_RADIUS,
            neighbors: LBP_NEIGHBORS,
            uniform: true,
            circular: true,
            rotation_invariant: false,
            compare_to_average: false,
            sparse_histogram: false,
            split_histogram: false,
        }
    }
}

impl LocalBinaryPatterns {
    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if self.block_overlap >= self.block_size {
            return Err(VeinError::config("block size smaller than block overlap"));
        }
        if self.sparse_histogram && self.split_histogram {
            return Err(VeinError::config("稀疏直方图与分块直方图不能同时使用"));
        }
        if !(4..=32).contains(&self.neighbors) {
            return Err(VeinError::config(format!(
                "LBP 邻居数必须在 [4, 32] 之间, 实际为 {}",
                self.neighbors
            )));
        }
        if !self.circular && self.neighbors != 4 && self.neighbors != 8 {
            return Err(VeinError::config("方形 LBP 只支持 4 或 8 个邻居"));
        }
        if self.radius == 0 {
            return Err(VeinError::config("LBP 半径必须至少为 1"));
        }
        let needs_table = matches!(
            self.mapping(),
            LbpMapping::Plain | LbpMapping::RotationInvariant
        );
        if needs_table && self.neighbors > MAX_TABLE_NEIGHBORS {
            return Err(VeinError::config(format!(
                "非 uniform 的 LBP 最多支持 {MAX_TABLE_NEIGHBORS} 个邻居"
            )));
        }
        Ok(())
    }

    /// 由 `uniform` 与 `rotation_invariant` 决定的映射方式.
    pub fn mapping(&self) -> LbpMapping {
        match (self.uniform, self.rotation_invariant) {
            (false, false) => LbpMapping::Plain,
            (true, false) => LbpMapping::Uniform,
            (false, true) => LbpMapping::RotationInvariant,
            (true, true) => LbpMapping::RotationInvariantUniform,
        }
    }

    /// 每个方块的直方图长度.
    pub fn bins(&self) -> usize {
        LabelTable::new(self.mapping(), self.neighbors).bins
    }

    /// 邻居相对中心的 `(行, 列)` 偏移, 从正上方 (方形时为左上角) 开始顺时针排列.
    fn offsets(&self) -> Vec<(f64, f64)> {
        let r = self.radius as f64;
        let p = self.neighbors;
        if self.circular {
            (0..p)
                .map(|i| {
                    let theta = 2.0 * std::f64::consts::PI * i as f64 / p as f64;
                    (snap(-r * theta.cos()), snap(r * theta.sin()))
                })
                .collect()
        } else if p == 4 {
            vec![(-r, 0.0), (0.0, r), (r, 0.0), (0.0, -r)]
        } else {
            vec![
                (-r, -r),
                (-r, 0.0),
                (-r, r),
                (0.0, r),
                (r, r),
                (r, 0.0),
                (r, -r),
                (0.0, -r),
            ]
        }
    }

    /// 单个方块的归一化直方图.
    fn block_histogram(
        &self,
        block: ArrayView2<f64>,
        offsets: &[(f64, f64)],
        table: &LabelTable,
    ) -> Array1<f64> {
        let mut hist = Array1::zeros(table.bins);
        let mut values = vec![0.0; offsets.len()];
        for (y, x) in PosIter::new(block.dim()) {
            let centre = block[[y, x]];
            for (v, &(dy, dx)) in values.iter_mut().zip(offsets) {
                *v = sample_wrapped(&block, y as f64 + dy, x as f64 + dx);
            }
            let reference = if self.compare_to_average {
                (values.iter().sum::<f64>() + centre) / (values.len() + 1) as f64
            } else {
                centre
            };
            let p = values.len();
            let code = values
                .iter()
                .enumerate()
                .filter(|(_, v)| **v >= reference)
                .fold(0_u64, |acc, (i, _)| acc | 1 << (p - 1 - i));
            hist[table.label(code)] += 1.0;
        }
        let total = block.len() as f64;
        if total > 0.0 {
            hist /= total;
        }
        hist
    }

    /// 所有方块的直方图, 每行一个方块, 按行优先顺序排列.
    pub fn block_histograms(
        &self,
        image: ArrayView2<f64>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<Array2<f64>> {
        ensure_same_shape(image.shape(), mask.shape())?;
        self.validate()?;
        let (h, w) = image.dim();
        let size = self.block_size;
        if h < size || w < size {
            return Err(VeinError::EmptyInput("图像小于一个 LBP 方块"));
        }
        let step = size - self.block_overlap;
        let rows = (h - size) / step + 1;
        let cols = (w - size) / step + 1;

        let scaled = apply_mask(image, mask).mapv(|v| v / MAX_F64);
        let table = LabelTable::new(self.mapping(), self.neighbors);
        let offsets = self.offsets();
        let mut out = Array2::zeros((rows * cols, table.bins));
        for (i, (br, bc)) in PosIter::new((rows, cols)).enumerate() {
            let (r0, c0) = (br * step, bc * step);
            let block = scaled.slice(s![r0..r0 + size, c0..c0 + size]);
            out.row_mut(i)
                .assign(&self.block_histogram(block, &offsets, &table));
        }
        debug!(
            "LBP, {rows}x{cols} 个方块, 每块 {} 个 bin, 映射 {:?}",
            table.bins,
            table.mapping
        );
        Ok(out)
    }
}

impl Extract for LocalBinaryPatterns {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        let blocks = self.block_histograms(image, mask)?;
        if self.split_histogram {
            return Ok(Feature::BlockHistograms(blocks));
        }
        let flat: Array1<f64> = blocks.iter().copied().collect();
        if self.sparse_histogram {
            let (indices, values) = flat
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(|(i, v)| (i, *v))
                .unzip();
            return Ok(Feature::SparseHistogram {
                len: flat.len(),
                indices,
                values,
            });
        }
        Ok(Feature::Histogram(flat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lbp(size: usize, overlap: usize, radius: usize, neighbors: usize) -> LocalBinaryPatterns {
        LocalBinaryPatterns {
            block_size: size,
            block_overlap: overlap,
            radius,
            neighbors,
            ..Default::default()
        }
    }

    fn textured() -> (Array2<f64>, Array2<bool>) {
        let image = Array2::from_shape_fn((30, 30), |(r, c)| ((r * 37 + c * 101) % 256) as f64);
        let mask = Array2::from_elem((30, 30), true);
        (image, mask)
    }

    #[test]
    fn test_bin_counts() {
        assert_eq!(LabelTable::new(LbpMapping::Plain, 8).bins, 256);
        assert_eq!(LabelTable::new(LbpMapping::Uniform, 8).bins, 59);
        assert_eq!(LabelTable::new(LbpMapping::RotationInvariantUniform, 8).bins, 10);
        assert_eq!(LabelTable::new(LbpMapping::RotationInvariant, 8).bins, 36);
        assert_eq!(LabelTable::new(LbpMapping::Uniform, 16).bins, 243);
    }

    #[test]
    fn test_uniform_labels_are_distinct() {
        let p = 8;
        let table = LabelTable::new(LbpMapping::Uniform, p);
        let uniform: Vec<u64> = (0..256).filter(|&c| transitions(c, p) <= 2).collect();
        assert_eq!(uniform.len(), 58);
        let labels: HashSet<usize> = uniform.iter().map(|&c| table.label(c)).collect();
        assert_eq!(labels.len(), 58);
        assert!(labels.iter().all(|&l| l < 58));
        assert_eq!(table.label(0b0101_0101), 58);
    }

    #[test]
    fn test_rotation_invariant_labels() {
        let table = LabelTable::new(LbpMapping::RotationInvariant, 8);
        assert_eq!(table.label(0b0000_0011), table.label(0b1100_0000));
        assert_ne!(table.label(0b0000_0011), table.label(0b0000_0101));
        let riu = LabelTable::new(LbpMapping::RotationInvariantUniform, 8);
        assert_eq!(riu.label(0b0011_1000), 3);
        assert_eq!(riu.label(0b0101_0000), 9);
    }

    #[test]
    fn test_histogram_layout() {
        let (image, mask) = textured();
        let extractor = lbp(10, 5, 1, 8);
        let blocks = extractor.block_histograms(image.view(), mask.view()).unwrap();
        assert_eq!(blocks.dim(), (25, 59));
        for row in blocks.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let feature = extractor.extract(image.view(), mask.view()).unwrap();
        assert_eq!(feature.shape(), vec![25 * 59]);
    }

    #[test]
    fn test_constant_block() {
        // 掩膜全为假时图像全为 0, 每个像素都是全 1 编码.
        let image = Array2::from_elem((12, 12), 90.0);
        let mask = Array2::from_elem((12, 12), false);
        let extractor = lbp(12, 0, 2, 8);
        let blocks = extractor.block_histograms(image.view(), mask.view()).unwrap();
        assert_eq!(blocks[[0, 57]], 1.0);

        let square = LocalBinaryPatterns {
            circular: false,
            ..lbp(12, 0, 1, 4)
        };
        let mask = Array2::from_elem((12, 12), true);
        let blocks = square.block_histograms(image.view(), mask.view()).unwrap();
        assert_eq!(blocks.dim(), (1, 15));
        assert_eq!(blocks[[0, 13]], 1.0);
    }

    #[test]
    fn test_sparse_and_split() {
        let (image, mask) = textured();
        let dense = lbp(10, 5, 1, 8).extract(image.view(), mask.view()).unwrap();
        let sparse = LocalBinaryPatterns {
            sparse_histogram: true,
            ..lbp(10, 5, 1, 8)
        }
        .extract(image.view(), mask.view())
        .unwrap();
        assert_eq!(sparse.to_plane(), dense.to_plane());

        let split = LocalBinaryPatterns {
            split_histogram: true,
            ..lbp(10, 5, 1, 8)
        }
        .extract(image.view(), mask.view())
        .unwrap();
        assert_eq!(split.shape(), vec![25, 59]);
    }

    #[test]
    fn test_validate() {
        let err = lbp(10, 10, 1, 8).validate().unwrap_err();
        assert_eq!(err.to_string(), "配置错误: block size smaller than block overlap");
        let both = LocalBinaryPatterns {
            sparse_histogram: true,
            split_histogram: true,
            ..Default::default()
        };
        assert!(both.validate().is_err());
        let square = LocalBinaryPatterns {
            circular: false,
            ..lbp(10, 5, 1, 16)
        };
        assert!(square.validate().is_err());
        let plain = LocalBinaryPatterns {
            uniform: false,
            ..lbp(10, 5, 1, 24)
        };
        assert!(plain.validate().is_err());
        assert!(LocalBinaryPatterns::default().validate().is_ok());
    }

    #[test]
    fn test_image_smaller_than_block() {
        let image = Array2::zeros((5, 5));
        let mask = Array2::from_elem((5, 5), true);
        assert!(lbp(10, 5, 1, 8).extract(image.view(), mask.view()).is_err());
    }
}
