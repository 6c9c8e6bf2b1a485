// Copyright 2024-2025 Irreducible Inc.

use std::iter;

use super::{Isa, IsaKernels};

pub(super) static SCALAR_KERNELS: IsaKernels = IsaKernels {
	isa: Isa::Scalar,
	dot: dot_lanes::<1>,
	axpy: axpy_lanes::<1>,
};

/// `init + Σ a[i] * b[i]` with `LANES` independent partial sums.
///
/// With a single lane the sum is accumulated in index order, starting from `init`. Otherwise the
/// lanes are reduced in lane order after the main loop and the tail is added last.
#[inline(always)]
pub(super) fn dot_lanes<const LANES: usize>(init: f32, a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len());

	if LANES == 1 {
		return iter::zip(a, b).fold(init, |acc, (&a, &b)| acc + a * b);
	}

	let a_chunks = a.chunks_exact(LANES);
	let b_chunks = b.chunks_exact(LANES);
	let tail = iter::zip(a_chunks.remainder(), b_chunks.remainder());

	let mut lanes = [0f32; LANES];
	for (a_chunk, b_chunk) in iter::zip(a_chunks, b_chunks) {
		for lane in 0..LANES {
			lanes[lane] += a_chunk[lane] * b_chunk[lane];
		}
	}

	let acc = lanes.iter().fold(init, |acc, &lane| acc + lane);
	tail.fold(acc, |acc, (&a, &b)| acc + a * b)
}

/// `y[i] += x[i] * alpha`, processed `LANES` elements at a time.
#[inline(always)]
pub(super) fn axpy_lanes<const LANES: usize>(y: &mut [f32], x: &[f32], alpha: f32) {
	debug_assert_eq!(y.len(), x.len());

	let mut y_chunks = y.chunks_exact_mut(LANES);
	let mut x_chunks = x.chunks_exact(LANES);
	for (y_chunk, x_chunk) in iter::zip(&mut y_chunks, &mut x_chunks) {
		for lane in 0..LANES {
			y_chunk[lane] += x_chunk[lane] * alpha;
		}
	}

	for (y, &x) in iter::zip(y_chunks.into_remainder(), x_chunks.remainder()) {
		*y += x * alpha;
	}
}
