// Copyright 2025 Irreducible Inc.

//! Buffer descriptors shared by the forward and backward kernels.
//!
//! All buffers are dense, row-major and owned by the caller. The weight is stored as `[O, I]`,
//! so that row `o` is exactly the dot-product vector of output unit `o` and the innermost
//! reduction over `I` is unit-stride.

use dense_utils::ensure;
use getset::CopyGetters;

use crate::error::Error;

/// Dimensions of one kernel invocation: batch size `B`, input width `I` and output width `O`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, CopyGetters)]
pub struct DenseShape {
	/// Number of independent samples, `B`.
	#[getset(get_copy = "pub")]
	batch: usize,
	/// Width of an input row, `I`.
	#[getset(get_copy = "pub")]
	n_in: usize,
	/// Width of an output row, `O`.
	#[getset(get_copy = "pub")]
	n_out: usize,
}

impl DenseShape {
	pub const fn new(batch: usize, n_in: usize, n_out: usize) -> Self {
		Self {
			batch,
			n_in,
			n_out,
		}
	}

	/// Length of `Input` and `InputGrad`, `B * I`.
	pub const fn input_len(&self) -> usize {
		self.batch * self.n_in
	}

	/// Length of `Weight` and `WeightGrad`, `O * I`.
	pub const fn weight_len(&self) -> usize {
		self.n_out * self.n_in
	}

	/// Length of `Output` and `OutputGrad`, `B * O`.
	pub const fn output_len(&self) -> usize {
		self.batch * self.n_out
	}

	/// Length of `Bias` and `BiasGrad`, `O`.
	pub const fn bias_len(&self) -> usize {
		self.n_out
	}

	/// Checks that every buffer length of this shape fits in `usize`.
	///
	/// ## Throws
	///
	/// * [`Error::ShapeOverflow`] if `B * I`, `O * I` or `B * O` overflows
	pub fn check_fits(&self) -> Result<(), Error> {
		let fits = self.batch.checked_mul(self.n_in).is_some()
			&& self.n_out.checked_mul(self.n_in).is_some()
			&& self.batch.checked_mul(self.n_out).is_some();
		ensure!(fits, Error::ShapeOverflow { shape: *self });
		Ok(())
	}

	/// Splits a flattened output index `k` into its `(b, o)` coordinates.
	///
	/// ## Preconditions
	///
	/// * `k < self.output_len()`
	pub const fn split_cell_index(&self, k: usize) -> (usize, usize) {
		(k / self.n_out, k % self.n_out)
	}
}

fn check_len(arg: &str, len: usize, expected: usize) -> Result<(), Error> {
	ensure!(
		len == expected,
		Error::IncorrectArgumentLength {
			arg: arg.into(),
			expected,
		}
	);
	Ok(())
}

#[inline]
pub(crate) fn row(buf: &[f32], index: usize, width: usize) -> &[f32] {
	&buf[index * width..(index + 1) * width]
}

#[inline]
pub(crate) fn row_mut(buf: &mut [f32], index: usize, width: usize) -> &mut [f32] {
	&mut buf[index * width..(index + 1) * width]
}

/// Read-only buffers of a forward pass.
#[derive(Debug, Clone, Copy)]
pub struct ForwardArgs<'a> {
	shape: DenseShape,
	input: &'a [f32],
	weight: &'a [f32],
	bias: Option<&'a [f32]>,
}

impl<'a> ForwardArgs<'a> {
	/// Checks every buffer against `shape`.
	///
	/// ## Throws
	///
	/// * [`Error::ShapeOverflow`] if the buffer lengths of `shape` overflow `usize`
	/// * [`Error::IncorrectArgumentLength`] if `input`, `weight` or `bias` is not sized to `shape`
	pub fn new(
		shape: DenseShape,
		input: &'a [f32],
		weight: &'a [f32],
		bias: Option<&'a [f32]>,
	) -> Result<Self, Error> {
		shape.check_fits()?;
		check_len("input", input.len(), shape.input_len())?;
		check_len("weight", weight.len(), shape.weight_len())?;
		if let Some(bias) = bias {
			check_len("bias", bias.len(), shape.bias_len())?;
		}
		Ok(Self {
			shape,
			input,
			weight,
			bias,
		})
	}

	pub const fn shape(&self) -> DenseShape {
		self.shape
	}

	pub const fn has_bias(&self) -> bool {
		self.bias.is_some()
	}

	pub fn input_row(&self, b: usize) -> &'a [f32] {
		row(self.input, b, self.shape.n_in)
	}

	pub fn weight_row(&self, o: usize) -> &'a [f32] {
		row(self.weight, o, self.shape.n_in)
	}

	/// The additive term of output unit `o`, zero when the bias is absent.
	pub fn bias_at(&self, o: usize) -> f32 {
		self.bias.map_or(0.0, |bias| bias[o])
	}
}

/// Read-only buffers of a backward pass.
#[derive(Debug, Clone, Copy)]
pub struct BackwardArgs<'a> {
	shape: DenseShape,
	d_out: &'a [f32],
	input: &'a [f32],
	weight: &'a [f32],
}

impl<'a> BackwardArgs<'a> {
	/// Checks every buffer against `shape`.
	///
	/// ## Throws
	///
	/// * [`Error::ShapeOverflow`] if the buffer lengths of `shape` overflow `usize`
	/// * [`Error::IncorrectArgumentLength`] if `d_out`, `input` or `weight` is not sized to `shape`
	pub fn new(
		shape: DenseShape,
		d_out: &'a [f32],
		input: &'a [f32],
		weight: &'a [f32],
	) -> Result<Self, Error> {
		shape.check_fits()?;
		check_len("d_out", d_out.len(), shape.output_len())?;
		check_len("input", input.len(), shape.input_len())?;
		check_len("weight", weight.len(), shape.weight_len())?;
		Ok(Self {
			shape,
			d_out,
			input,
			weight,
		})
	}

	pub const fn shape(&self) -> DenseShape {
		self.shape
	}

	pub fn input_row(&self, b: usize) -> &'a [f32] {
		row(self.input, b, self.shape.n_in)
	}

	pub fn weight_row(&self, o: usize) -> &'a [f32] {
		row(self.weight, o, self.shape.n_in)
	}

	pub fn d_out_at(&self, b: usize, o: usize) -> f32 {
		self.d_out[b * self.shape.n_out + o]
	}
}

/// Destination of a forward pass, one cell per `(b, o)`.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
	shape: DenseShape,
	out: &'a mut [f32],
}

impl<'a> OutputBuffer<'a> {
	/// Checks `out` against `shape`.
	///
	/// ## Throws
	///
	/// * [`Error::ShapeOverflow`] if the buffer lengths of `shape` overflow `usize`
	/// * [`Error::IncorrectArgumentLength`] if `out` does not have `B * O` elements
	pub fn new(shape: DenseShape, out: &'a mut [f32]) -> Result<Self, Error> {
		shape.check_fits()?;
		check_len("out", out.len(), shape.output_len())?;
		Ok(Self { shape, out })
	}

	pub const fn shape(&self) -> DenseShape {
		self.shape
	}

	pub fn cells(&self) -> &[f32] {
		&*self.out
	}

	pub fn cells_mut(&mut self) -> &mut [f32] {
		&mut *self.out
	}
}

/// Gradient accumulation targets of a backward pass.
///
/// The kernels add into these buffers and never clear them. A missing `d_bias` means the layer
/// has no bias, in which case no bias gradient is ever written.
#[derive(Debug)]
pub struct GradBuffers<'a> {
	shape: DenseShape,
	pub(crate) d_in: &'a mut [f32],
	pub(crate) d_weight: &'a mut [f32],
	pub(crate) d_bias: Option<&'a mut [f32]>,
}

impl<'a> GradBuffers<'a> {
	/// Checks every buffer against `shape`.
	///
	/// ## Throws
	///
	/// * [`Error::ShapeOverflow`] if the buffer lengths of `shape` overflow `usize`
	/// * [`Error::IncorrectArgumentLength`] if `d_in`, `d_weight` or `d_bias` is not sized to
	///   `shape`
	pub fn new(
		shape: DenseShape,
		d_in: &'a mut [f32],
		d_weight: &'a mut [f32],
		d_bias: Option<&'a mut [f32]>,
	) -> Result<Self, Error> {
		shape.check_fits()?;
		check_len("d_in", d_in.len(), shape.input_len())?;
		check_len("d_weight", d_weight.len(), shape.weight_len())?;
		if let Some(d_bias) = &d_bias {
			check_len("d_bias", d_bias.len(), shape.bias_len())?;
		}
		Ok(Self {
			shape,
			d_in,
			d_weight,
			d_bias,
		})
	}

	pub const fn shape(&self) -> DenseShape {
		self.shape
	}

	pub fn d_in(&self) -> &[f32] {
		&*self.d_in
	}

	pub fn d_weight(&self) -> &[f32] {
		&*self.d_weight
	}

	pub fn d_bias(&self) -> Option<&[f32]> {
		self.d_bias.as_deref()
	}

	/// Borrows the three targets as disjoint mutable slices.
	pub fn parts_mut(&mut self) -> (&mut [f32], &mut [f32], Option<&mut [f32]>) {
		(&mut *self.d_in, &mut *self.d_weight, self.d_bias.as_deref_mut())
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[test]
	fn test_shape_lengths() {
		let shape = DenseShape::new(2, 3, 4);
		assert_eq!(shape.input_len(), 6);
		assert_eq!(shape.weight_len(), 12);
		assert_eq!(shape.output_len(), 8);
		assert_eq!(shape.bias_len(), 4);
		assert_eq!(shape.split_cell_index(0), (0, 0));
		assert_eq!(shape.split_cell_index(5), (1, 1));
		assert_eq!(shape.split_cell_index(7), (1, 3));
	}

	#[test]
	fn test_forward_args_rows() {
		let input = [1.0, 2.0, 3.0, 0.0, 1.0, 0.0];
		let weight = [1.0, 0.0, 1.0, 0.0, 1.0, 1.0];
		let bias = [0.0, 1.0];
		let args =
			ForwardArgs::new(DenseShape::new(2, 3, 2), &input, &weight, Some(&bias[..])).unwrap();
		assert_eq!(args.input_row(1), &[0.0, 1.0, 0.0]);
		assert_eq!(args.weight_row(1), &[0.0, 1.0, 1.0]);
		assert_eq!(args.bias_at(1), 1.0);

		let args = ForwardArgs::new(DenseShape::new(2, 3, 2), &input, &weight, None).unwrap();
		assert!(!args.has_bias());
		assert_eq!(args.bias_at(1), 0.0);
	}

	#[test]
	fn test_forward_args_rejects_bad_lengths() {
		let shape = DenseShape::new(2, 3, 2);
		let weight = [0.0; 6];
		assert_matches!(
			ForwardArgs::new(shape, &[0.0; 5], &weight, None),
			Err(Error::IncorrectArgumentLength { arg, expected: 6 }) if arg == "input"
		);
		assert_matches!(
			ForwardArgs::new(shape, &[0.0; 6], &weight[..4], None),
			Err(Error::IncorrectArgumentLength { arg, expected: 6 }) if arg == "weight"
		);
		assert_matches!(
			ForwardArgs::new(shape, &[0.0; 6], &weight, Some(&[0.0; 3][..])),
			Err(Error::IncorrectArgumentLength { arg, expected: 2 }) if arg == "bias"
		);
	}

	#[test]
	fn test_overflowing_shape_is_rejected() {
		let shape = DenseShape::new(1 << (usize::BITS - 1), 2, 1);
		assert_matches!(shape.check_fits(), Err(Error::ShapeOverflow { shape: s }) if s == shape);
		assert_matches!(
			ForwardArgs::new(shape, &[], &[1.0, 1.0], None),
			Err(Error::ShapeOverflow { .. })
		);
		assert_matches!(
			BackwardArgs::new(shape, &[], &[], &[1.0, 1.0]),
			Err(Error::ShapeOverflow { .. })
		);
		assert_matches!(
			GradBuffers::new(shape, &mut [], &mut [0.0; 2], None),
			Err(Error::ShapeOverflow { .. })
		);
		assert_matches!(OutputBuffer::new(shape, &mut []), Err(Error::ShapeOverflow { .. }));

		let wide = DenseShape::new(1, usize::MAX, 2);
		assert_matches!(wide.check_fits(), Err(Error::ShapeOverflow { .. }));
		assert!(DenseShape::new(usize::MAX, 1, 1).check_fits().is_ok());
	}

	#[test]
	fn test_output_buffer_rejects_bad_length() {
		let shape = DenseShape::new(2, 3, 2);
		let mut out = [0.0; 3];
		assert_matches!(
			OutputBuffer::new(shape, &mut out),
			Err(Error::IncorrectArgumentLength { arg, expected: 4 }) if arg == "out"
		);
		let mut out = [0.0; 4];
		let mut buffer = OutputBuffer::new(shape, &mut out).unwrap();
		buffer.cells_mut()[3] = 1.0;
		assert_eq!(buffer.cells(), &[0.0, 0.0, 0.0, 1.0]);
	}

	#[test]
	fn test_backward_args_rejects_bad_lengths() {
		let shape = DenseShape::new(2, 3, 2);
		assert_matches!(
			BackwardArgs::new(shape, &[0.0; 3], &[0.0; 6], &[0.0; 6]),
			Err(Error::IncorrectArgumentLength { arg, expected: 4 }) if arg == "d_out"
		);
		let args = BackwardArgs::new(shape, &[1.0, 2.0, 3.0, 4.0], &[0.0; 6], &[0.0; 6]).unwrap();
		assert_eq!(args.d_out_at(1, 0), 3.0);
	}

	#[test]
	fn test_grad_buffers_rejects_bad_lengths() {
		let shape = DenseShape::new(2, 3, 2);
		let mut d_in = [0.0; 6];
		let mut d_weight = [0.0; 6];
		let mut d_bias = [0.0; 1];
		assert_matches!(
			GradBuffers::new(shape, &mut d_in, &mut d_weight, Some(&mut d_bias[..])),
			Err(Error::IncorrectArgumentLength { arg, expected: 2 }) if arg == "d_bias"
		);
		let mut grads = GradBuffers::new(shape, &mut d_in, &mut d_weight, None).unwrap();
		let (_, _, d_bias) = grads.parts_mut();
		assert!(d_bias.is_none());
	}

	#[test]
	fn test_zero_width_rows() {
		let bias = [1.0, 2.0];
		let args =
			ForwardArgs::new(DenseShape::new(3, 0, 2), &[], &[], Some(&bias[..])).unwrap();
		assert!(args.input_row(2).is_empty());
		assert!(args.weight_row(1).is_empty());
	}
}
