//! AVX2 and AVX-512F kernels.
//!
//! # Safety
//!
//! Every function here requires that the running CPU supports the enabled
//! target features and that `a`, `b` (and `out`) have the same length.
//! [`super::Kernel`] checks both before calling in.

use std::arch::x86_64::*;

use super::scalar;

/// `out = a + b`, four lanes at a time with a scalar tail.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn elementwise_add_avx2(a: &[f64], b: &[f64], out: &mut [f64]) {
    let n = out.len();
    let (pa, pb, po) = (a.as_ptr(), b.as_ptr(), out.as_mut_ptr());

    let mut i = 0;
    while i + 4 <= n {
        // SAFETY: i + 4 <= n and all three slices hold n values.
        unsafe {
            let va = _mm256_loadu_pd(pa.add(i));
            let vb = _mm256_loadu_pd(pb.add(i));
            _mm256_storeu_pd(po.add(i), _mm256_add_pd(va, vb));
        }
        i += 4;
    }

    scalar::elementwise_add(&a[i..], &b[i..], &mut out[i..]);
}

/// Σ a·b with a 4-lane FMA accumulator.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_product_avx2(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let (pa, pb) = (a.as_ptr(), b.as_ptr());

    let mut acc = _mm256_setzero_pd();
    let mut i = 0;
    while i + 4 <= n {
        // SAFETY: i + 4 <= n and both slices hold n values.
        unsafe {
            let va = _mm256_loadu_pd(pa.add(i));
            let vb = _mm256_loadu_pd(pb.add(i));
            acc = _mm256_fmadd_pd(va, vb, acc);
        }
        i += 4;
    }

    // Horizontal reduction: 4 -> 2 -> 1
    let pair = _mm_add_pd(_mm256_castpd256_pd128(acc), _mm256_extractf128_pd::<1>(acc));
    let mut result = _mm_cvtsd_f64(_mm_add_sd(pair, _mm_unpackhi_pd(pair, pair)));

    for (&x, &y) in a[i..].iter().zip(&b[i..]) {
        result += x * y;
    }
    result
}

/// `out = a + b`: 32 values per iteration, then 8, then one masked step.
#[target_feature(enable = "avx512f")]
pub(super) unsafe fn elementwise_add_avx512(a: &[f64], b: &[f64], out: &mut [f64]) {
    let n = out.len();
    let (pa, pb, po) = (a.as_ptr(), b.as_ptr(), out.as_mut_ptr());

    let mut i = 0;

    // Four independent adds per iteration keep the ports busy.
    while i + 32 <= n {
        // SAFETY: i + 32 <= n and all three slices hold n values.
        unsafe {
            for k in [0, 8, 16, 24] {
                let va = _mm512_loadu_pd(pa.add(i + k));
                let vb = _mm512_loadu_pd(pb.add(i + k));
                _mm512_storeu_pd(po.add(i + k), _mm512_add_pd(va, vb));
            }
        }
        i += 32;
    }

    while i + 8 <= n {
        // SAFETY: i + 8 <= n and all three slices hold n values.
        unsafe {
            let va = _mm512_loadu_pd(pa.add(i));
            let vb = _mm512_loadu_pd(pb.add(i));
            _mm512_storeu_pd(po.add(i), _mm512_add_pd(va, vb));
        }
        i += 8;
    }

    if i < n {
        // n - i is in 1..=7, so the shift stays inside the mask.
        let mask: __mmask8 = (1u8 << (n - i)) - 1;
        // SAFETY: masked-off lanes are neither read nor written, and the
        // enabled lanes are in bounds.
        unsafe {
            let va = _mm512_maskz_loadu_pd(mask, pa.add(i));
            let vb = _mm512_maskz_loadu_pd(mask, pb.add(i));
            _mm512_mask_storeu_pd(po.add(i), mask, _mm512_add_pd(va, vb));
        }
    }
}

/// Σ a·b with an 8-lane FMA accumulator.
#[target_feature(enable = "avx512f")]
pub(super) unsafe fn dot_product_avx512(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let (pa, pb) = (a.as_ptr(), b.as_ptr());

    let mut acc = _mm512_setzero_pd();
    let mut i = 0;
    while i + 8 <= n {
        // SAFETY: i + 8 <= n and both slices hold n values.
        unsafe {
            let va = _mm512_loadu_pd(pa.add(i));
            let vb = _mm512_loadu_pd(pb.add(i));
            acc = _mm512_fmadd_pd(va, vb, acc);
        }
        i += 8;
    }

    let mut result = _mm512_reduce_add_pd(acc);

    for (&x, &y) in a[i..].iter().zip(&b[i..]) {
        result += x * y;
    }
    result
}
