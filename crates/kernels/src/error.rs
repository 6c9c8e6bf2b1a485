// Copyright 2024-2025 Irreducible Inc.

use std::ops::Range;

use crate::{arch::Isa, shape::DenseShape};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("argument {arg} does not have expected length {expected}")]
	IncorrectArgumentLength { arg: String, expected: usize },
	#[error("argument {arg} must be in the range {range:?}")]
	ArgumentRange { arg: String, range: Range<usize> },
	#[error("buffer lengths of {shape:?} overflow usize")]
	ShapeOverflow { shape: DenseShape },
	#[error("buffer of length {len} does not hold a whole number of rows of width {width}")]
	IncompleteBatch { len: usize, width: usize },
	#[error("instruction set {isa:?} is not supported on this CPU")]
	UnsupportedIsa { isa: Isa },
}
