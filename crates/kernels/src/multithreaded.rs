// Copyright 2025 Irreducible Inc.

use dense_utils::rayon::get_log_max_threads;
use rayon::prelude::*;
use tracing::instrument;

use crate::{
	arch::Isa,
	dense_kernel::DenseKernel,
	partition::{par_rows_mut, run_partitioned, InputRows, OutputCells, ParamRows},
	shape::{BackwardArgs, ForwardArgs, GradBuffers, OutputBuffer},
	single_threaded::SingleThreadedKernel,
};

/// Implementation of [`DenseKernel`] that distributes partition units over the rayon pool.
///
/// The forward pass runs one unit per output cell. The backward pass runs the batch-partitioned
/// units into `InputGrad` and the output-partitioned units into `WeightGrad`/`BiasGrad`
/// concurrently; the two families write disjoint buffers, so no locking is involved and the
/// result equals the combined loop of [`SingleThreadedKernel`] bit for bit.
#[derive(Debug, Clone, Copy)]
pub struct MultithreadedKernel {
	single_threaded: SingleThreadedKernel,
	log_max_threads: usize,
}

impl SingleThreadedKernel {
	/// Returns multithreaded kernel implementation which uses default number of threads.
	pub fn multithreaded(self) -> MultithreadedKernel {
		self.multithreaded_with_max_threads(get_log_max_threads())
	}

	/// Returns multithreaded kernel implementation which uses `1 << log_max_threads` threads.
	pub const fn multithreaded_with_max_threads(
		self,
		log_max_threads: usize,
	) -> MultithreadedKernel {
		MultithreadedKernel {
			single_threaded: self,
			log_max_threads,
		}
	}
}

impl MultithreadedKernel {
	pub const fn log_max_threads(&self) -> usize {
		self.log_max_threads
	}

	pub const fn single_threaded(&self) -> &SingleThreadedKernel {
		&self.single_threaded
	}
}

impl DenseKernel for MultithreadedKernel {
	fn isa(&self) -> Isa {
		self.single_threaded.isa()
	}

	#[instrument(
		skip_all,
		name = "MultithreadedKernel::forward",
		level = "debug",
		fields(shape = ?args.shape(), log_max_threads = self.log_max_threads)
	)]
	fn forward(&self, args: &ForwardArgs<'_>, out: &mut OutputBuffer<'_>) {
		if self.log_max_threads == 0 {
			return self.single_threaded.forward(args, out);
		}

		assert_eq!(out.shape(), args.shape(), "output shape differs from input shape");
		run_partitioned(
			&OutputCells::new(&self.single_threaded, args),
			out.cells_mut().par_iter_mut(),
			self.log_max_threads,
		);
	}

	fn forward_cell(&self, args: &ForwardArgs<'_>, k: usize, cell: &mut f32) {
		self.single_threaded.forward_cell(args, k, cell)
	}

	#[instrument(
		skip_all,
		name = "MultithreadedKernel::backward",
		level = "debug",
		fields(shape = ?args.shape(), log_max_threads = self.log_max_threads)
	)]
	fn backward(&self, args: &BackwardArgs<'_>, grads: &mut GradBuffers<'_>) {
		if self.log_max_threads == 0 {
			return self.single_threaded.backward(args, grads);
		}

		let shape = args.shape();
		assert_eq!(grads.shape(), shape, "gradient shape differs from input shape");

		let kernel = &self.single_threaded;
		let (d_in, d_weight, d_bias) = grads.parts_mut();
		let d_weight_rows = par_rows_mut(d_weight, shape.n_in(), shape.n_out());

		rayon::join(
			|| {
				run_partitioned(
					&InputRows::new(kernel, args),
					par_rows_mut(d_in, shape.n_in(), shape.batch()),
					self.log_max_threads,
				)
			},
			|| {
				let param_rows = ParamRows::new(kernel, args);
				match d_bias {
					Some(d_bias) => run_partitioned(
						&param_rows,
						d_weight_rows.zip(d_bias.par_iter_mut().map(Some)),
						self.log_max_threads,
					),
					None => run_partitioned(
						&param_rows,
						d_weight_rows.map(|row| (row, None::<&mut f32>)),
						self.log_max_threads,
					),
				}
			},
		);
	}

	fn backward_input_row(&self, args: &BackwardArgs<'_>, b: usize, d_in_row: &mut [f32]) {
		self.single_threaded.backward_input_row(args, b, d_in_row)
	}

	fn backward_param_row(
		&self,
		args: &BackwardArgs<'_>,
		o: usize,
		d_weight_row: &mut [f32],
		d_bias: Option<&mut f32>,
	) {
		self.single_threaded
			.backward_param_row(args, o, d_weight_row, d_bias)
	}
}
