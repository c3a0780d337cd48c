//! 多项式曲线.

// ref: https://blog.csdn.net/u012494154/article/details/112519550

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1};

/// 多项式, 系数按次数升序存储: `c[0] + c[1] x + c[2] x^2 + ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial<T: num::Float>(pub(crate) Array1<T>);

macro_rules! impl_polynomial {
    ($fp: ty, $zero: expr) => {
        impl Polynomial<$fp> {
            /// 在 `x` 处求值 (Horner 法).
            pub fn eval(&self, x: $fp) -> $fp {
                self.0.iter().rev().fold($zero, |acc, &cur| acc * x + cur)
            }

            /// 系数, 按次数升序.
            #[inline]
            pub fn coefficients(&self) -> &Array1<$fp> {
                &self.0
            }

            /// 多项式次数.
            #[inline]
            pub fn degree(&self) -> usize {
                self.0.len().saturating_sub(1)
            }
        }
    };
}

impl_polynomial!(f32, 0.0_f32);
impl_polynomial!(f64, 0.0_f64);

pub(crate) struct PolyImp<'a, T: num::Float> {
    x: ArrayView1<'a, T>,
    y: ArrayView1<'a, T>,
    degree: usize,
}

macro_rules! impl_poly_imp {
    ($fp: ty) => {
        impl<'a> PolyImp<'a, $fp> {
            /// 调用方保证 `x.len() == y.len() > degree`.
            pub fn new(x: ArrayView1<'a, $fp>, y: ArrayView1<'a, $fp>, degree: usize) -> Self {
                debug_assert_eq!(x.len(), y.len());
                Self { x, y, degree }
            }

            /// 解正规方程 `(VᵀV) θ = Vᵀy`. 矩阵奇异时返回 `None`.
            pub fn fit(&self) -> Option<Polynomial<$fp>> {
                let v_mat = self.vandermonde();
                let v_mat_t = v_mat.transpose();
                let y = DVector::from_iterator(self.y.len(), self.y.iter().copied());

                let theta = (&v_mat_t * &v_mat).try_inverse()? * v_mat_t * y;

                debug_assert_eq!(theta.len(), self.degree + 1);
                Some(Polynomial(theta.iter().copied().collect()))
            }

            fn vandermonde(&self) -> DMatrix<$fp> {
                // shape: (m, n); m = x.len(), n = self.degree + 1
                DMatrix::<$fp>::from_fn(self.x.len(), self.degree + 1, |m, n| {
                    self.x[m].powi(n as i32)
                })
            }
        }
    };
}

impl_poly_imp!(f32);
impl_poly_imp!(f64);
