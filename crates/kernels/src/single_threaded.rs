// Copyright 2025 Irreducible Inc.

use tracing::instrument;

use crate::{
	arch::{detected_kernels, Isa, IsaKernels},
	dense_kernel::DenseKernel,
	error::Error,
	shape::{row_mut, BackwardArgs, ForwardArgs, GradBuffers, OutputBuffer},
};

/// Implementation of [`DenseKernel`] that runs every loop on the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct SingleThreadedKernel {
	kernels: &'static IsaKernels,
}

impl Default for SingleThreadedKernel {
	fn default() -> Self {
		Self::new()
	}
}

impl SingleThreadedKernel {
	/// Kernel using the instruction set returned by [`Isa::detect`].
	pub fn new() -> Self {
		Self {
			kernels: detected_kernels(),
		}
	}

	/// Kernel using an explicit instruction set.
	///
	/// ## Throws
	///
	/// * [`Error::UnsupportedIsa`] if the running CPU lacks `isa`
	pub fn with_isa(isa: Isa) -> Result<Self, Error> {
		Ok(Self {
			kernels: isa.kernels()?,
		})
	}
}

impl DenseKernel for SingleThreadedKernel {
	fn isa(&self) -> Isa {
		self.kernels.isa
	}

	#[instrument(
		skip_all,
		name = "SingleThreadedKernel::forward",
		level = "debug",
		fields(shape = ?args.shape())
	)]
	fn forward(&self, args: &ForwardArgs<'_>, out: &mut OutputBuffer<'_>) {
		assert_eq!(out.shape(), args.shape(), "output shape differs from input shape");

		for (k, cell) in out.cells_mut().iter_mut().enumerate() {
			self.forward_cell(args, k, cell);
		}
	}

	fn forward_cell(&self, args: &ForwardArgs<'_>, k: usize, cell: &mut f32) {
		let shape = args.shape();
		debug_assert!(k < shape.output_len());

		let (b, o) = shape.split_cell_index(k);
		*cell = (self.kernels.dot)(args.bias_at(o), args.weight_row(o), args.input_row(b));
	}

	#[instrument(
		skip_all,
		name = "SingleThreadedKernel::backward",
		level = "debug",
		fields(shape = ?args.shape())
	)]
	fn backward(&self, args: &BackwardArgs<'_>, grads: &mut GradBuffers<'_>) {
		let shape = args.shape();
		assert_eq!(grads.shape(), shape, "gradient shape differs from input shape");

		let axpy = self.kernels.axpy;
		let n_in = shape.n_in();
		let (d_in, d_weight, mut d_bias) = grads.parts_mut();

		for b in 0..shape.batch() {
			let input_row = args.input_row(b);
			let d_in_row = row_mut(d_in, b, n_in);
			for o in 0..shape.n_out() {
				let delta = args.d_out_at(b, o);
				axpy(d_in_row, args.weight_row(o), delta);
				axpy(row_mut(d_weight, o, n_in), input_row, delta);
				if let Some(d_bias) = d_bias.as_deref_mut() {
					d_bias[o] += delta;
				}
			}
		}
	}

	fn backward_input_row(&self, args: &BackwardArgs<'_>, b: usize, d_in_row: &mut [f32]) {
		let shape = args.shape();
		debug_assert!(b < shape.batch());
		debug_assert_eq!(d_in_row.len(), shape.n_in());

		for o in 0..shape.n_out() {
			(self.kernels.axpy)(d_in_row, args.weight_row(o), args.d_out_at(b, o));
		}
	}

	fn backward_param_row(
		&self,
		args: &BackwardArgs<'_>,
		o: usize,
		d_weight_row: &mut [f32],
		mut d_bias: Option<&mut f32>,
	) {
		let shape = args.shape();
		debug_assert!(o < shape.n_out());
		debug_assert_eq!(d_weight_row.len(), shape.n_in());

		for b in 0..shape.batch() {
			let delta = args.d_out_at(b, o);
			(self.kernels.axpy)(d_weight_row, args.input_row(b), delta);
			if let Some(d_bias) = d_bias.as_deref_mut() {
				*d_bias += delta;
			}
		}
	}
}
