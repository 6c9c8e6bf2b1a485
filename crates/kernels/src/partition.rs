// Copyright 2025 Irreducible Inc.

//! Work units with disjoint destinations and the parallel-for executor that runs them.
//!
//! A [`Partition`] describes a family of independent units. Each unit receives exclusive access
//! to the region of the destination buffer it writes, so the borrow checker guarantees that no
//! two concurrently running units write the same memory. The kernel bodies know nothing about
//! threads; [`run_partitioned`] distributes the units over the rayon pool.

use dense_utils::rayon::min_units_per_job;
use rayon::{iter::Either, prelude::*};

use crate::{
	dense_kernel::DenseKernel,
	shape::{BackwardArgs, ForwardArgs},
};

/// A family of independent work units indexed by `0..n`.
pub trait Partition: Sync {
	/// The exclusive destination region handed to one unit.
	type Unit<'u>: Send;

	fn run_unit(&self, index: usize, unit: Self::Unit<'_>);
}

/// Forward single-element mode: unit `k` writes output cell `k`.
#[derive(Debug)]
pub struct OutputCells<'a, K> {
	kernel: &'a K,
	args: &'a ForwardArgs<'a>,
}

impl<'a, K> OutputCells<'a, K> {
	pub const fn new(kernel: &'a K, args: &'a ForwardArgs<'a>) -> Self {
		Self { kernel, args }
	}
}

impl<K: DenseKernel + Sync> Partition for OutputCells<'_, K> {
	type Unit<'u> = &'u mut f32;

	fn run_unit(&self, index: usize, cell: &mut f32) {
		self.kernel.forward_cell(self.args, index, cell);
	}
}

/// Backward partitioned by batch: unit `b` writes row `b` of `InputGrad`.
#[derive(Debug)]
pub struct InputRows<'a, K> {
	kernel: &'a K,
	args: &'a BackwardArgs<'a>,
}

impl<'a, K> InputRows<'a, K> {
	pub const fn new(kernel: &'a K, args: &'a BackwardArgs<'a>) -> Self {
		Self { kernel, args }
	}
}

impl<K: DenseKernel + Sync> Partition for InputRows<'_, K> {
	type Unit<'u> = &'u mut [f32];

	fn run_unit(&self, index: usize, d_in_row: &mut [f32]) {
		self.kernel.backward_input_row(self.args, index, d_in_row);
	}
}

/// Backward partitioned by output: unit `o` writes row `o` of `WeightGrad` and cell `o` of
/// `BiasGrad`.
#[derive(Debug)]
pub struct ParamRows<'a, K> {
	kernel: &'a K,
	args: &'a BackwardArgs<'a>,
}

impl<'a, K> ParamRows<'a, K> {
	pub const fn new(kernel: &'a K, args: &'a BackwardArgs<'a>) -> Self {
		Self { kernel, args }
	}
}

impl<K: DenseKernel + Sync> Partition for ParamRows<'_, K> {
	type Unit<'u> = (&'u mut [f32], Option<&'u mut f32>);

	fn run_unit(&self, index: usize, (d_weight_row, d_bias): Self::Unit<'_>) {
		self.kernel
			.backward_param_row(self.args, index, d_weight_row, d_bias);
	}
}

/// Runs every unit yielded by `units`, the `i`-th unit with index `i`.
///
/// The units are split into at most `2^log_max_threads` rayon jobs.
pub fn run_partitioned<'u, P, I>(partition: &P, units: I, log_max_threads: usize)
where
	P: Partition,
	I: IndexedParallelIterator<Item = P::Unit<'u>>,
{
	let min_len = min_units_per_job(units.len(), log_max_threads);
	units
		.enumerate()
		.with_min_len(min_len)
		.for_each(|(index, unit)| partition.run_unit(index, unit));
}

/// Splits `buf` into `n_rows` consecutive rows of `width` elements.
///
/// Unlike `par_chunks_mut`, a zero `width` yields `n_rows` empty rows.
///
/// ## Preconditions
///
/// * `buf.len() == n_rows * width`
pub fn par_rows_mut(
	buf: &mut [f32],
	width: usize,
	n_rows: usize,
) -> impl IndexedParallelIterator<Item = &mut [f32]> + '_ {
	debug_assert_eq!(buf.len(), n_rows * width);

	if width == 0 {
		Either::Left((0..n_rows).into_par_iter().map(|_| <&mut [f32]>::default()))
	} else {
		Either::Right(buf.par_chunks_mut(width))
	}
}
