use ordered_float::OrderedFloat;

/// 中位数. 元素个数为偶数时取中间两个数的平均值, 与 `numpy.median` 一致.
/// 空输入返回 `None`.
pub fn median<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let mut v: Vec<OrderedFloat<f64>> = values.into_iter().map(OrderedFloat).collect();
    if v.is_empty() {
        return None;
    }
    let n = v.len();
    let (lower, upper, _) = v.select_nth_unstable(n / 2);
    let upper = upper.0;
    if n % 2 == 1 {
        return Some(upper);
    }
    // 偶数个元素时, 较小的中间值是下半部分的最大值.
    let below = lower.iter().max().map_or(upper, |x| x.0);
    Some((below + upper) / 2.0)
}

/// 正值的中位数. 没有正值时返回 `None`.
pub fn positive_median<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<f64> {
    median(values.into_iter().copied().filter(|v| *v > 0.0))
}

/// 第一个最大值的下标. 空输入返回 `None`.
pub fn argmax_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// 第一个最小值的下标. 空输入返回 `None`.
pub fn argmin_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    argmax_first(values.into_iter().map(|v| -v))
}
