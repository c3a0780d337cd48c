//! ROI (感兴趣区域) 多边形标注及坐标工具.
//!
//! 坐标一律按照 `(行, 列)` 即 `(y, x)` 的顺序存储, 与 `ndarray` 的索引顺序一致.
//! 标注来自外部数据源, 顶点可能落在图像之外, 所以使用带符号整数.

use crate::error::{VeinError, VeinResult};
use crate::{Idx2d, Point2d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 多边形 ROI 标注, 顶点按顺序首尾相连.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    points: Vec<Point2d>,
}

impl Roi {
    /// 从顶点序列构建.
    #[inline]
    pub fn new(points: Vec<Point2d>) -> Self {
        Self { points }
    }

    /// 顶点.
    #[inline]
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// 顶点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有顶点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Vec<Point2d> {
        self.points
    }

    /// 将所有顶点平移 `(dy, dx)`.
    pub fn translated(&self, (dy, dx): Point2d) -> Self {
        Self::new(self.points.iter().map(|&(y, x)| (y + dy, x + dx)).collect())
    }

    /// 将所有顶点截断到形状为 `shape` 的区域内. 见 [`fix_points`].
    #[inline]
    pub fn clipped(&self, shape: Idx2d) -> VeinResult<Self> {
        Ok(Self::new(fix_points(shape, &self.points)?))
    }
}

impl From<Vec<Point2d>> for Roi {
    #[inline]
    fn from(points: Vec<Point2d>) -> Self {
        Self::new(points)
    }
}

/// 检查 `point` 是否位于形状为 `(h, w)` 的区域内.
#[inline]
pub fn is_inside((h, w): Idx2d, (y, x): Point2d) -> bool {
    y >= 0 && x >= 0 && (y as u64) < h as u64 && (x as u64) < w as u64
}

/// 检查所有点都位于形状为 `shape` 的区域内.
///
/// 遇到第一个越界点时返回 [`VeinError::PointOutOfRange`], 错误信息中包含该点.
pub fn assert_points(shape: Idx2d, points: &[Point2d]) -> VeinResult<()> {
    match points.iter().find(|p| !is_inside(shape, **p)) {
        Some(&point) => Err(VeinError::PointOutOfRange { point, shape }),
        None => Ok(()),
    }
}

/// 将所有点截断到形状为 `(h, w)` 的区域内: 行被限制在 `[0, h - 1]`,
/// 列被限制在 `[0, w - 1]`. 越界的点被移到最近的边界上, 而不是被丢弃.
///
/// 区域为空 (`h` 或 `w` 为 0) 时没有可以截断到的位置, 返回 [`VeinError::EmptyInput`].
pub fn fix_points((h, w): Idx2d, points: &[Point2d]) -> VeinResult<Vec<Point2d>> {
    if h == 0 || w == 0 {
        return Err(VeinError::EmptyInput("截断坐标点的区域为空"));
    }
    let (max_y, max_x) = (h as i64 - 1, w as i64 - 1);
    Ok(points
        .iter()
        .map(|&(y, x)| (y.clamp(0, max_y), x.clamp(0, max_x)))
        .collect())
}
