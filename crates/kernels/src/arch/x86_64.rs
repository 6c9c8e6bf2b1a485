// Copyright 2024-2025 Irreducible Inc.

use super::{
	portable::{axpy_lanes, dot_lanes},
	Isa, IsaKernels,
};

const LANES: usize = 8;

/// Only reachable through [`Isa::kernels`], which checks [`is_supported`] first.
pub(super) static AVX2_KERNELS: IsaKernels = IsaKernels {
	isa: Isa::Avx2,
	dot,
	axpy,
};

pub(super) fn is_supported() -> bool {
	is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

fn dot(init: f32, a: &[f32], b: &[f32]) -> f32 {
	// SAFETY: the table holding this function is handed out only when AVX2 and FMA are present.
	unsafe { dot_avx2(init, a, b) }
}

fn axpy(y: &mut [f32], x: &[f32], alpha: f32) {
	// SAFETY: the table holding this function is handed out only when AVX2 and FMA are present.
	unsafe { axpy_avx2(y, x, alpha) }
}

#[target_feature(enable = "avx2,fma")]
unsafe fn dot_avx2(init: f32, a: &[f32], b: &[f32]) -> f32 {
	dot_lanes::<LANES>(init, a, b)
}

#[target_feature(enable = "avx2,fma")]
unsafe fn axpy_avx2(y: &mut [f32], x: &[f32], alpha: f32) {
	axpy_lanes::<LANES>(y, x, alpha)
}
