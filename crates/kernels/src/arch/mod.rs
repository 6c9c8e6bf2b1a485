// Copyright 2024-2025 Irreducible Inc.

//! Instruction-set specific instantiations of the kernel primitives.
//!
//! Every primitive has one generic body, parameterized by the number of lanes, which is compiled
//! once per instruction set inside a `#[target_feature]` wrapper. The instruction set is picked
//! at runtime through a table of function pointers.

use std::{fmt, sync::OnceLock};

use cfg_if::cfg_if;
use dense_utils::{ensure, env::boolean_env_flag_set};

use crate::error::Error;

mod portable;

cfg_if! {
	if #[cfg(target_arch = "x86_64")] {
		mod x86_64;
	} else if #[cfg(target_arch = "aarch64")] {
		mod aarch64;
	}
}

/// Environment flag forcing [`Isa::detect`] to return [`Isa::Scalar`].
pub const FORCE_SCALAR_ENV: &str = "DENSE_FORCE_SCALAR";

/// An instruction set the kernels can be compiled for.
///
/// All instruction sets implement the same contract. They are not bit-identical to each other:
/// the vectorized dot product keeps one partial sum per lane and reassociates the reduction,
/// while [`Isa::Scalar`] sums strictly in index order `0..I`. Element-wise accumulation into
/// gradients is bit-identical across instruction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Isa {
	/// Single accumulator, strict index order.
	Scalar,
	/// x86_64 with AVX2 and FMA, eight lanes.
	Avx2,
	/// aarch64 with NEON, four lanes.
	Neon,
}

impl Isa {
	pub const ALL: [Isa; 3] = [Isa::Scalar, Isa::Avx2, Isa::Neon];

	/// Number of partial sums kept by the dot product.
	pub const fn lanes(self) -> usize {
		match self {
			Isa::Scalar => 1,
			Isa::Avx2 => 8,
			Isa::Neon => 4,
		}
	}

	/// Whether the running CPU supports this instruction set.
	pub fn is_supported(self) -> bool {
		match self {
			Isa::Scalar => true,
			#[cfg(target_arch = "x86_64")]
			Isa::Avx2 => x86_64::is_supported(),
			#[cfg(target_arch = "aarch64")]
			Isa::Neon => aarch64::is_supported(),
			#[allow(unreachable_patterns)]
			_ => false,
		}
	}

	/// The widest supported instruction set, detected once per process.
	///
	/// Returns [`Isa::Scalar`] when the `DENSE_FORCE_SCALAR` flag is set.
	pub fn detect() -> Self {
		detected_kernels().isa
	}

	pub(crate) fn kernels(self) -> Result<&'static IsaKernels, Error> {
		ensure!(self.is_supported(), Error::UnsupportedIsa { isa: self });
		let kernels = match self {
			#[cfg(target_arch = "x86_64")]
			Isa::Avx2 => &x86_64::AVX2_KERNELS,
			#[cfg(target_arch = "aarch64")]
			Isa::Neon => &aarch64::NEON_KERNELS,
			_ => &portable::SCALAR_KERNELS,
		};
		Ok(kernels)
	}
}

/// Dispatch table of one instruction set.
pub(crate) struct IsaKernels {
	pub isa: Isa,
	/// Returns `init + Σ a[i] * b[i]`.
	pub dot: fn(f32, &[f32], &[f32]) -> f32,
	/// Performs `y[i] += x[i] * alpha`.
	pub axpy: fn(&mut [f32], &[f32], f32),
}

impl fmt::Debug for IsaKernels {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IsaKernels").field("isa", &self.isa).finish()
	}
}

pub(crate) fn detected_kernels() -> &'static IsaKernels {
	static DETECTED: OnceLock<&'static IsaKernels> = OnceLock::new();

	DETECTED.get_or_init(|| {
		let kernels = if boolean_env_flag_set(FORCE_SCALAR_ENV) {
			&portable::SCALAR_KERNELS
		} else {
			[Isa::Avx2, Isa::Neon]
				.into_iter()
				.filter(|isa| isa.is_supported())
				.find_map(|isa| isa.kernels().ok())
				.unwrap_or(&portable::SCALAR_KERNELS)
		};
		tracing::debug!(isa = ?kernels.isa, "selected dense kernel instruction set");
		kernels
	})
}
