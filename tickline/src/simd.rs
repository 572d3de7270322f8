//! Vectorized f64 kernels with build-time variant selection.
//!
//! Provides elementwise add and dot product for three execution strategies:
//! - AVX-512F (x86_64)
//! - AVX2 + FMA (x86_64)
//! - Scalar fallback (all platforms)
//!
//! The free functions [`elementwise_add`] and [`dot_product`] use the variant
//! the crate was compiled for ([`Variant::COMPILED`]), so there is no runtime
//! dispatch at all. Build with `RUSTFLAGS="-C target-cpu=native"` to pick up
//! the host's vector units. [`Kernel::detected`] chooses at startup instead.
//!
//! Addition is bit-identical across variants. Dot products reduce lane-wise
//! and may differ from the scalar sum in the last bits.

mod kernel;
mod scalar;
mod variant;
#[cfg(target_arch = "x86_64")]
mod x86;

pub use kernel::Kernel;
pub use variant::Variant;

const COMPILED: Kernel = Kernel::compiled();

/// `out[i] = a[i] + b[i]` using the compiled-in variant.
///
/// # Panics
///
/// Panics if `a`, `b` and `out` differ in length.
///
/// # Example
///
/// ```
/// let mut out = [0.0; 3];
/// tickline::simd::elementwise_add(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &mut out);
/// assert_eq!(out, [5.0, 7.0, 9.0]);
/// ```
#[inline]
pub fn elementwise_add(a: &[f64], b: &[f64], out: &mut [f64]) {
    COMPILED.elementwise_add(a, b, out);
}

/// Σ `a[i] * b[i]` using the compiled-in variant.
///
/// # Panics
///
/// Panics if `a` and `b` differ in length.
///
/// # Example
///
/// ```
/// assert_eq!(tickline::simd::dot_product(&[1.0; 4], &[2.0; 4]), 8.0);
/// assert_eq!(tickline::simd::dot_product(&[], &[]), 0.0);
/// ```
#[inline]
#[must_use]
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    COMPILED.dot_product(a, b)
}
