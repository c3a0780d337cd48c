//! 曲线拟合.
//!
//! 给定一系列点 `(x, y)`, 该模块可以用最小二乘法拟合出一条多项式曲线.
//! 归一化阶段用一次多项式拟合手指中线.

use ndarray::ArrayView1;

use crate::error::{VeinError, VeinResult};

mod polynomial;

pub use polynomial::Polynomial;

macro_rules! impl_polyfit {
    ($($name: ident: $fp: ty),+) => {
        $(
            /// 基于最小二乘法拟合 `degree` 次多项式.
            ///
            /// `x` 是自变量数组, `y` 是对应函数值. 点数必须多于 `degree`,
            /// 且 `x` 中至少有 `degree + 1` 个不同的值, 否则返回错误.
            pub fn $name<'a>(
                x: ArrayView1<'a, $fp>,
                y: ArrayView1<'a, $fp>,
                degree: usize,
            ) -> VeinResult<Polynomial<$fp>> {
                if x.len() != y.len() {
                    return Err(VeinError::shape(&[x.len()], &[y.len()]));
                }
                if x.len() <= degree {
                    return Err(VeinError::EmptyInput("拟合点数不足"));
                }
                polynomial::PolyImp::<$fp>::new(x, y, degree)
                    .fit()
                    .ok_or_else(|| VeinError::config("拟合矩阵奇异, x 的取值过少"))
            }
        )+
    };
}

impl_polyfit!(polyfit_f64: f64, polyfit_f32: f32);
