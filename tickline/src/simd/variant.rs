//! Hardware capability selection.
//!
//! ```text
//! Variant   Requirement        Lanes (f64)
//! ───────   ─────────────────  ───────────
//! Widest    AVX-512F           8
//! Wide      AVX2 + FMA         4
//! Scalar    portable           1
//! ```
//!
//! [`Variant::COMPILED`] is fixed by the target features the crate was built
//! with (`-C target-cpu=native`, `-C target-feature=+avx2,+fma`, ...).
//! [`Variant::detect`] probes the running CPU once and caches the answer.

use std::fmt;
use std::sync::OnceLock;

use crate::trace::info;

/// SIMD execution strategy for the f64 kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Portable scalar loop.
    Scalar,
    /// 256-bit AVX2 with FMA (`x86_64` only).
    Wide,
    /// 512-bit AVX-512F (`x86_64` only).
    Widest,
}

static DETECTED: OnceLock<Variant> = OnceLock::new();

impl Variant {
    /// Every variant, narrowest first.
    pub const ALL: [Self; 3] = [Self::Scalar, Self::Wide, Self::Widest];

    /// Best variant the binary was compiled for.
    pub const COMPILED: Self = if cfg!(all(target_arch = "x86_64", target_feature = "avx512f")) {
        Self::Widest
    } else if cfg!(all(
        target_arch = "x86_64",
        target_feature = "avx2",
        target_feature = "fma"
    )) {
        Self::Wide
    } else {
        Self::Scalar
    };

    /// Number of f64 values processed per vector step.
    #[inline]
    #[must_use]
    pub const fn lanes(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Wide => 4,
            Self::Widest => 8,
        }
    }

    /// Short instruction-set name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Wide => "avx2",
            Self::Widest => "avx512f",
        }
    }

    /// Human-readable description for banners and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scalar => "Scalar (fallback)",
            Self::Wide => "AVX2 + FMA (Haswell+)",
            Self::Widest => "AVX-512F (Skylake-SP / Ice Lake+)",
        }
    }

    /// Whether the running CPU can execute this variant.
    #[must_use]
    pub fn is_supported(self) -> bool {
        match self {
            Self::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            Self::Wide => {
                std::arch::is_x86_feature_detected!("avx2")
                    && std::arch::is_x86_feature_detected!("fma")
            }
            #[cfg(target_arch = "x86_64")]
            Self::Widest => std::arch::is_x86_feature_detected!("avx512f"),
            #[cfg(not(target_arch = "x86_64"))]
            Self::Wide | Self::Widest => false,
        }
    }

    /// Widest variant the running CPU supports, probed once per process.
    #[must_use]
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let variant = Self::ALL
                .into_iter()
                .rev()
                .find(|v| v.is_supported())
                .unwrap_or(Self::Scalar);
            info!(
                detected = variant.name(),
                compiled = Self::COMPILED.name(),
                "selected simd variant"
            );
            variant
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
