use crate::Idx2d;

/// 获得 `(h, w)` 的 8-邻居索引, 按 "列偏移在外, 行偏移在内" 的顺序排列,
/// 即 `(-1,-1), (0,-1), (1,-1), (-1,0), (1,0), (-1,1), (0,1), (1,1)`
/// (`(行, 列)` 偏移). 不检查越界.
#[inline]
pub fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h, w.wrapping_sub(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}

/// 行优先索引迭代器, 可选择只遍历距边界至少 `margin` 的内部像素.
///
/// 虽然如下函数也能实现相同的功能:
///
/// ```
/// type Idx2d = (usize, usize);
///
/// fn pos_iter_auto((h, w): Idx2d) -> impl Iterator<Item = Idx2d> {
///     (0..h).flat_map(move |first| (0..w).map(move |second| (first, second)))
/// }
/// ```
///
/// 但该迭代器对象占用的空间是手写 `PosIter` 的数倍, 而它在各个特征提取器的
/// 内层循环中被频繁构造. 因此我们保留该结构.
#[derive(Debug, Clone)]
pub struct PosIter {
    cur_h: usize,
    cur_w: usize,
    w_begin: usize,
    h_end: usize,
    w_end: usize,
}

impl PosIter {
    /// 遍历形状为 `(h, w)` 的全部像素.
    #[inline]
    pub fn new(shape: Idx2d) -> Self {
        Self::interior(shape, 0)
    }

    /// 遍历 `[margin, h - margin) × [margin, w - margin)`. 区域为空时不产生任何元素.
    #[inline]
    pub fn interior((h, w): Idx2d, margin: usize) -> Self {
        let h_end = h.saturating_sub(margin);
        let w_end = w.saturating_sub(margin);
        // 空区域直接令迭代器耗尽.
        let cur_h = if margin >= w_end { h_end } else { margin };
        Self {
            cur_h,
            cur_w: margin,
            w_begin: margin,
            h_end,
            w_end,
        }
    }
}

impl Iterator for PosIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_h >= self.h_end {
            return None;
        }
        let ret_pos = (self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w_end {
            self.cur_w = self.w_begin;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }
}
