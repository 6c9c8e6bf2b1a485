// Copyright 2025 Irreducible Inc.

//! A fully connected layer that owns its parameters and drives a [`DenseKernel`].

use std::ops::Range;

use dense_utils::{bail, ensure};
use getset::{CopyGetters, Getters};
use rand::{
	distributions::{Distribution, Uniform},
	Rng,
};
use tracing::instrument;

use crate::{
	dense_kernel::DenseKernel,
	error::Error,
	shape::{BackwardArgs, DenseShape, ForwardArgs, GradBuffers, OutputBuffer},
};

/// Accepted range for both layer widths.
pub const LAYER_WIDTH_RANGE: Range<usize> = 1..16383;

/// Dense layer `Output[b, o] = Bias[o] + Σ_i Input[b, i] * Weight[o, i]`.
///
/// Parameters and their gradients live in the layer, activations are passed in by the caller.
/// Gradients accumulate across calls to [`Linear::backward`] until [`Linear::zero_grad`].
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Linear<K> {
	#[getset(get_copy = "pub")]
	n_in: usize,
	#[getset(get_copy = "pub")]
	n_out: usize,
	#[getset(get = "pub")]
	kernel: K,
	weight: Vec<f32>,
	bias: Option<Vec<f32>>,
	weight_grad: Vec<f32>,
	bias_grad: Option<Vec<f32>>,
}

fn check_width(arg: &str, width: usize) -> Result<(), Error> {
	ensure!(
		LAYER_WIDTH_RANGE.contains(&width),
		Error::ArgumentRange {
			arg: arg.into(),
			range: LAYER_WIDTH_RANGE,
		}
	);
	Ok(())
}

impl<K: DenseKernel> Linear<K> {
	/// Creates a layer with zeroed parameters and gradients.
	///
	/// ## Throws
	///
	/// * [`Error::ArgumentRange`] if `n_in` or `n_out` is outside [`LAYER_WIDTH_RANGE`]
	pub fn new(n_in: usize, n_out: usize, bias: bool, kernel: K) -> Result<Self, Error> {
		check_width("n_in", n_in)?;
		check_width("n_out", n_out)?;

		Ok(Self {
			n_in,
			n_out,
			kernel,
			weight: vec![0.0; n_out * n_in],
			bias: bias.then(|| vec![0.0; n_out]),
			weight_grad: vec![0.0; n_out * n_in],
			bias_grad: bias.then(|| vec![0.0; n_out]),
		})
	}

	/// Fills weight and bias uniformly from `[-1/sqrt(n_in), 1/sqrt(n_in)]`.
	pub fn init_uniform(&mut self, rng: &mut impl Rng) {
		let bound = (self.n_in as f32).sqrt().recip();
		let dist = Uniform::new_inclusive(-bound, bound);

		for value in self.weight.iter_mut().chain(self.bias.iter_mut().flatten()) {
			*value = dist.sample(rng);
		}
	}

	pub const fn has_bias(&self) -> bool {
		self.bias.is_some()
	}

	/// Row-major `[n_out, n_in]` weight.
	pub fn weight(&self) -> &[f32] {
		&self.weight
	}

	pub fn weight_mut(&mut self) -> &mut [f32] {
		&mut self.weight
	}

	pub fn bias(&self) -> Option<&[f32]> {
		self.bias.as_deref()
	}

	pub fn bias_mut(&mut self) -> Option<&mut [f32]> {
		self.bias.as_deref_mut()
	}

	pub fn weight_grad(&self) -> &[f32] {
		&self.weight_grad
	}

	pub fn bias_grad(&self) -> Option<&[f32]> {
		self.bias_grad.as_deref()
	}

	/// Clears the accumulated parameter gradients.
	pub fn zero_grad(&mut self) {
		self.weight_grad.fill(0.0);
		if let Some(bias_grad) = &mut self.bias_grad {
			bias_grad.fill(0.0);
		}
	}

	/// Shape of a batch held in `input`.
	///
	/// ## Throws
	///
	/// * [`Error::IncompleteBatch`] if `input` is not a whole number of rows of width `n_in`
	pub fn batch_shape(&self, input: &[f32]) -> Result<DenseShape, Error> {
		if input.len() % self.n_in != 0 {
			bail!(Error::IncompleteBatch {
				len: input.len(),
				width: self.n_in,
			});
		}
		Ok(DenseShape::new(input.len() / self.n_in, self.n_in, self.n_out))
	}

	/// Computes the `[B, n_out]` output for a batch of `B` input rows.
	///
	/// ## Throws
	///
	/// * [`Error::IncompleteBatch`] if `input` is not a whole number of rows of width `n_in`
	#[instrument(skip_all, name = "Linear::forward", level = "debug")]
	pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>, Error> {
		let shape = self.batch_shape(input)?;
		let args = ForwardArgs::new(shape, input, &self.weight, self.bias.as_deref())?;

		let mut out = vec![0.0; shape.output_len()];
		self.kernel
			.forward(&args, &mut OutputBuffer::new(shape, &mut out)?);
		Ok(out)
	}

	/// Back-propagates `d_out` through the layer.
	///
	/// Returns the gradient with respect to `input` and accumulates the parameter gradients.
	///
	/// ## Throws
	///
	/// * [`Error::IncompleteBatch`] if `input` is not a whole number of rows of width `n_in`
	/// * [`Error::IncorrectArgumentLength`] if `d_out` does not have `B * n_out` elements
	#[instrument(skip_all, name = "Linear::backward", level = "debug")]
	pub fn backward(&mut self, input: &[f32], d_out: &[f32]) -> Result<Vec<f32>, Error> {
		let shape = self.batch_shape(input)?;
		let args = BackwardArgs::new(shape, d_out, input, &self.weight)?;

		let mut d_in = vec![0.0; shape.input_len()];
		let mut grads = GradBuffers::new(
			shape,
			&mut d_in,
			&mut self.weight_grad,
			self.bias_grad.as_deref_mut(),
		)?;
		self.kernel.backward(&args, &mut grads);
		Ok(d_in)
	}
}
