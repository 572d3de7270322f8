use std::fmt;

use super::scalar;
use super::variant::Variant;
use crate::error::KernelError;
use crate::trace::{debug, warn};

#[cfg(target_arch = "x86_64")]
use super::x86;

type AddFn = unsafe fn(&[f64], &[f64], &mut [f64]);
type DotFn = unsafe fn(&[f64], &[f64]) -> f64;

/// f64 arithmetic kernels bound to one [`Variant`].
///
/// The function table is resolved when the kernel is built; calls jump
/// straight to the variant's implementation with no per-call dispatch.
/// A `Kernel` can only be obtained for a variant the CPU supports.
///
/// # Example
///
/// ```
/// use tickline::simd::Kernel;
///
/// let kernel = Kernel::detected();
/// let mut out = [0.0; 3];
/// kernel.elementwise_add(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &mut out);
/// assert_eq!(out, [5.0, 7.0, 9.0]);
/// assert_eq!(kernel.dot_product(&[1.0; 4], &[2.0; 4]), 8.0);
/// ```
#[derive(Clone, Copy)]
pub struct Kernel {
    variant: Variant,
    add: AddFn,
    dot: DotFn,
}

impl Kernel {
    /// Kernel for [`Variant::COMPILED`].
    ///
    /// Needs no runtime check: the binary only runs on CPUs with the target
    /// features it was compiled for.
    #[must_use]
    pub const fn compiled() -> Self {
        Self::resolve(Variant::COMPILED)
    }

    /// Kernel for [`Variant::detect`], the widest variant this CPU runs.
    #[must_use]
    pub fn detected() -> Self {
        let variant = Variant::detect();
        debug!(variant = variant.name(), "using detected kernel");
        Self::resolve(variant)
    }

    /// Kernel for an explicitly requested variant.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Unsupported`] if the CPU lacks the instructions
    /// `variant` needs.
    pub fn new(variant: Variant) -> Result<Self, KernelError> {
        if !variant.is_supported() {
            warn!(variant = variant.name(), "requested kernel not supported");
            return Err(KernelError::Unsupported(variant));
        }
        debug!(variant = variant.name(), "using requested kernel");
        Ok(Self::resolve(variant))
    }

    /// Binds the function table. Callers guarantee `variant` is supported.
    const fn resolve(variant: Variant) -> Self {
        match variant {
            Variant::Scalar => Self {
                variant,
                add: scalar::elementwise_add,
                dot: scalar::dot_product,
            },
            #[cfg(target_arch = "x86_64")]
            Variant::Wide => Self {
                variant,
                add: x86::elementwise_add_avx2,
                dot: x86::dot_product_avx2,
            },
            #[cfg(target_arch = "x86_64")]
            Variant::Widest => Self {
                variant,
                add: x86::elementwise_add_avx512,
                dot: x86::dot_product_avx512,
            },
            #[cfg(not(target_arch = "x86_64"))]
            Variant::Wide | Variant::Widest => Self {
                variant: Variant::Scalar,
                add: scalar::elementwise_add,
                dot: scalar::dot_product,
            },
        }
    }

    #[inline]
    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// `out[i] = a[i] + b[i]` for every `i`.
    ///
    /// Results are bit-identical across variants.
    ///
    /// # Panics
    ///
    /// Panics if `a`, `b` and `out` differ in length.
    #[inline]
    pub fn elementwise_add(&self, a: &[f64], b: &[f64], out: &mut [f64]) {
        assert!(
            a.len() == out.len() && b.len() == out.len(),
            "elementwise_add length mismatch: a={}, b={}, out={}",
            a.len(),
            b.len(),
            out.len()
        );
        // SAFETY: lengths checked above; the variant was checked when this
        // kernel was built.
        unsafe { (self.add)(a, b, out) }
    }

    /// Σ `a[i] * b[i]`.
    ///
    /// Vector variants sum lane-wise before reducing, so results can differ
    /// from [`Variant::Scalar`] in the last bits. Empty input yields `0.0`.
    ///
    /// # Panics
    ///
    /// Panics if `a` and `b` differ in length.
    #[inline]
    #[must_use]
    pub fn dot_product(&self, a: &[f64], b: &[f64]) -> f64 {
        assert!(
            a.len() == b.len(),
            "dot_product length mismatch: a={}, b={}",
            a.len(),
            b.len()
        );
        // SAFETY: lengths checked above; the variant was checked when this
        // kernel was built.
        unsafe { (self.dot)(a, b) }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::compiled()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}
