// Copyright 2024-2025 Irreducible Inc.

use super::{
	portable::{axpy_lanes, dot_lanes},
	Isa, IsaKernels,
};

const LANES: usize = 4;

/// Only reachable through [`Isa::kernels`], which checks [`is_supported`] first.
pub(super) static NEON_KERNELS: IsaKernels = IsaKernels {
	isa: Isa::Neon,
	dot,
	axpy,
};

pub(super) fn is_supported() -> bool {
	std::arch::is_aarch64_feature_detected!("neon")
}

fn dot(init: f32, a: &[f32], b: &[f32]) -> f32 {
	// SAFETY: the table holding this function is handed out only when NEON is present.
	unsafe { dot_neon(init, a, b) }
}

fn axpy(y: &mut [f32], x: &[f32], alpha: f32) {
	// SAFETY: the table holding this function is handed out only when NEON is present.
	unsafe { axpy_neon(y, x, alpha) }
}

#[target_feature(enable = "neon")]
unsafe fn dot_neon(init: f32, a: &[f32], b: &[f32]) -> f32 {
	dot_lanes::<LANES>(init, a, b)
}

#[target_feature(enable = "neon")]
unsafe fn axpy_neon(y: &mut [f32], x: &[f32], alpha: f32) {
	axpy_lanes::<LANES>(y, x, alpha)
}
