// Copyright 2025 Irreducible Inc.

use auto_impl::auto_impl;

use crate::{
	arch::Isa,
	shape::{BackwardArgs, ForwardArgs, GradBuffers, OutputBuffer},
};

/// The dense affine transform `Out = In · Weight^T + Bias` and its gradients.
///
/// Implementations differ in how they schedule work and in which instruction set they use; all
/// of them satisfy the same contract:
///
/// * Forward: `Output[b, o] = Bias[o] + Σ_i Weight[o, i] * Input[b, i]`, with a missing bias
///   treated as zero. Every output cell is written exactly once.
/// * Backward: `InputGrad[b, i] += Σ_o Weight[o, i] * OutputGrad[b, o]`,
///   `WeightGrad[o, i] += Σ_b Input[b, i] * OutputGrad[b, o]` and, when present,
///   `BiasGrad[o] += Σ_b OutputGrad[b, o]`. Gradients are added into, never overwritten.
///
/// The kernels never allocate and never fail. Buffer sizes are validated when the
/// [`ForwardArgs`], [`BackwardArgs`], [`OutputBuffer`] and [`GradBuffers`] descriptors are
/// built. The whole-buffer entry points panic when the descriptors disagree on the shape; the
/// remaining preconditions of the partition units are checked with debug assertions.
///
/// Besides the whole-buffer entry points, the trait exposes partition units. Each unit writes a
/// region of a destination buffer that no other unit of the same kind touches, so any scheduler
/// can run units concurrently without synchronization:
///
/// * [`Self::forward_cell`] writes one output cell.
/// * [`Self::backward_input_row`] writes one row of `InputGrad`.
/// * [`Self::backward_param_row`] writes one row of `WeightGrad` and one cell of `BiasGrad`.
///
/// Running `backward_input_row` for every `b` and `backward_param_row` for every `o`, in any
/// order or concurrently, gives the same result as [`Self::backward`].
#[auto_impl(&)]
pub trait DenseKernel {
	/// Instruction set used by the inner loops.
	fn isa(&self) -> Isa;

	/// Computes every output cell.
	///
	/// ## Panics
	///
	/// * if `out.shape() != args.shape()`
	fn forward(&self, args: &ForwardArgs<'_>, out: &mut OutputBuffer<'_>);

	/// Computes output cell `k = b * O + o` into `cell`.
	///
	/// ## Preconditions
	///
	/// * `k < args.shape().output_len()`
	fn forward_cell(&self, args: &ForwardArgs<'_>, k: usize, cell: &mut f32);

	/// Accumulates all gradients with one combined loop nest.
	///
	/// ## Panics
	///
	/// * if `grads.shape() != args.shape()`
	fn backward(&self, args: &BackwardArgs<'_>, grads: &mut GradBuffers<'_>);

	/// Accumulates the contribution of batch row `b` into `d_in_row`, the `b`-th row of
	/// `InputGrad`. Parameter gradients are left untouched.
	///
	/// ## Preconditions
	///
	/// * `b < args.shape().batch()`
	/// * `d_in_row.len() == args.shape().n_in()`
	fn backward_input_row(&self, args: &BackwardArgs<'_>, b: usize, d_in_row: &mut [f32]);

	/// Accumulates the contribution of output unit `o`, summed over the batch, into
	/// `d_weight_row`, the `o`-th row of `WeightGrad`, and into `d_bias`, the `o`-th cell of
	/// `BiasGrad`. `InputGrad` is left untouched.
	///
	/// ## Preconditions
	///
	/// * `o < args.shape().n_out()`
	/// * `d_weight_row.len() == args.shape().n_in()`
	fn backward_param_row(
		&self,
		args: &BackwardArgs<'_>,
		o: usize,
		d_weight_row: &mut [f32],
		d_bias: Option<&mut f32>,
	);
}
