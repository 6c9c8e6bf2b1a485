// Copyright 2025 Irreducible Inc.

//! Naive loop nests used as the oracle in unit tests.

use std::iter::repeat_with;

use rand::Rng;

use crate::{
	dense_kernel::DenseKernel,
	shape::{BackwardArgs, DenseShape, ForwardArgs, GradBuffers, OutputBuffer},
};

/// Randomly filled buffers of one layer invocation.
#[derive(Debug, Clone)]
pub struct DenseData {
	pub shape: DenseShape,
	pub input: Vec<f32>,
	pub weight: Vec<f32>,
	pub bias: Option<Vec<f32>>,
	pub d_out: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grads {
	pub d_in: Vec<f32>,
	pub d_weight: Vec<f32>,
	pub d_bias: Option<Vec<f32>>,
}

impl Grads {
	pub fn buffers(&mut self, shape: DenseShape) -> GradBuffers<'_> {
		GradBuffers::new(shape, &mut self.d_in, &mut self.d_weight, self.d_bias.as_deref_mut())
			.unwrap()
	}
}

fn random_vec(rng: &mut impl Rng, len: usize) -> Vec<f32> {
	repeat_with(|| rng.gen_range(-1.0..1.0)).take(len).collect()
}

impl DenseData {
	pub fn random(shape: DenseShape, with_bias: bool, rng: &mut impl Rng) -> Self {
		Self {
			shape,
			input: random_vec(rng, shape.input_len()),
			weight: random_vec(rng, shape.weight_len()),
			bias: with_bias.then(|| random_vec(rng, shape.bias_len())),
			d_out: random_vec(rng, shape.output_len()),
		}
	}

	pub fn forward_args(&self) -> ForwardArgs<'_> {
		ForwardArgs::new(self.shape, &self.input, &self.weight, self.bias.as_deref()).unwrap()
	}

	pub fn backward_args(&self) -> BackwardArgs<'_> {
		BackwardArgs::new(self.shape, &self.d_out, &self.input, &self.weight).unwrap()
	}

	pub fn zeroed_grads(&self) -> Grads {
		Grads {
			d_in: vec![0.0; self.shape.input_len()],
			d_weight: vec![0.0; self.shape.weight_len()],
			d_bias: self.bias.as_ref().map(|bias| vec![0.0; bias.len()]),
		}
	}
}

/// Runs `kernel` over a NaN-filled output, so unwritten cells stand out.
pub fn run_forward(kernel: &impl DenseKernel, args: &ForwardArgs<'_>) -> Vec<f32> {
	let shape = args.shape();
	let mut out = vec![f32::NAN; shape.output_len()];
	kernel.forward(args, &mut OutputBuffer::new(shape, &mut out).unwrap());
	out
}

pub fn forward(data: &DenseData) -> Vec<f32> {
	let (n_batch, n_in, n_out) = (data.shape.batch(), data.shape.n_in(), data.shape.n_out());

	let mut out = vec![0.0; n_batch * n_out];
	for b in 0..n_batch {
		for o in 0..n_out {
			let mut acc = data.bias.as_ref().map_or(0.0, |bias| bias[o]);
			for i in 0..n_in {
				acc += data.weight[o * n_in + i] * data.input[b * n_in + i];
			}
			out[b * n_out + o] = acc;
		}
	}
	out
}

pub fn backward(data: &DenseData) -> Grads {
	let (n_batch, n_in, n_out) = (data.shape.batch(), data.shape.n_in(), data.shape.n_out());

	let mut grads = data.zeroed_grads();
	for b in 0..n_batch {
		for o in 0..n_out {
			let delta = data.d_out[b * n_out + o];
			for i in 0..n_in {
				grads.d_in[b * n_in + i] += data.weight[o * n_in + i] * delta;
				grads.d_weight[o * n_in + i] += data.input[b * n_in + i] * delta;
			}
			if let Some(d_bias) = &mut grads.d_bias {
				d_bias[o] += delta;
			}
		}
	}
	grads
}
