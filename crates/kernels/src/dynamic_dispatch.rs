// Copyright 2024-2025 Irreducible Inc.

use dense_utils::rayon::get_log_max_threads;

use crate::{
	arch::Isa,
	dense_kernel::DenseKernel,
	error::Error,
	multithreaded::MultithreadedKernel,
	shape::{BackwardArgs, ForwardArgs, GradBuffers, OutputBuffer},
	single_threaded::SingleThreadedKernel,
};

/// How many threads to use (threads number is a power of 2).
#[derive(Default, Debug, Clone, Copy)]
pub enum ThreadingSettings {
	/// Use a single thread for calculations.
	#[default]
	SingleThreaded,
	/// Use the default number of threads based on the number of cores.
	MultithreadedDefault,
	/// Explicitly set the logarithm of number of threads.
	ExplicitThreadsCount { log_threads: usize },
}

impl ThreadingSettings {
	/// Get the log2 of the number of threads to use.
	pub fn log_threads_count(&self) -> usize {
		match self {
			ThreadingSettings::SingleThreaded => 0,
			ThreadingSettings::MultithreadedDefault => get_log_max_threads(),
			ThreadingSettings::ExplicitThreadsCount { log_threads } => *log_threads,
		}
	}

	/// Check if settings imply multithreading.
	pub fn is_multithreaded(&self) -> bool {
		match self {
			ThreadingSettings::SingleThreaded => false,
			ThreadingSettings::MultithreadedDefault => true,
			ThreadingSettings::ExplicitThreadsCount { log_threads } => *log_threads > 0,
		}
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KernelOptions {
	/// Instruction set to use, [`Isa::detect`] when unset.
	pub isa: Option<Isa>,
	pub thread_settings: ThreadingSettings,
}

/// An enum that can be used to switch between different kernel implementations without passing
/// [`DenseKernel`] as a type parameter.
#[derive(Debug, Clone, Copy)]
pub enum DynamicDispatchKernel {
	SingleThreaded(SingleThreadedKernel),
	MultiThreaded(MultithreadedKernel),
}

impl Default for DynamicDispatchKernel {
	fn default() -> Self {
		Self::SingleThreaded(SingleThreadedKernel::new())
	}
}

impl DynamicDispatchKernel {
	/// Create a new kernel based on the given settings.
	///
	/// ## Throws
	///
	/// * [`Error::UnsupportedIsa`] if `options.isa` is not supported on the running CPU
	pub fn new(options: KernelOptions) -> Result<Self, Error> {
		let single_threaded = match options.isa {
			Some(isa) => SingleThreadedKernel::with_isa(isa)?,
			None => SingleThreadedKernel::new(),
		};

		let result = match options.thread_settings.log_threads_count() {
			0 => DynamicDispatchKernel::SingleThreaded(single_threaded),
			log_threads => DynamicDispatchKernel::MultiThreaded(
				single_threaded.multithreaded_with_max_threads(log_threads),
			),
		};

		Ok(result)
	}
}

impl DenseKernel for DynamicDispatchKernel {
	fn isa(&self) -> Isa {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => kernel.isa(),
			DynamicDispatchKernel::MultiThreaded(kernel) => kernel.isa(),
		}
	}

	fn forward(&self, args: &ForwardArgs<'_>, out: &mut OutputBuffer<'_>) {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => kernel.forward(args, out),
			DynamicDispatchKernel::MultiThreaded(kernel) => kernel.forward(args, out),
		}
	}

	fn forward_cell(&self, args: &ForwardArgs<'_>, k: usize, cell: &mut f32) {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => kernel.forward_cell(args, k, cell),
			DynamicDispatchKernel::MultiThreaded(kernel) => kernel.forward_cell(args, k, cell),
		}
	}

	fn backward(&self, args: &BackwardArgs<'_>, grads: &mut GradBuffers<'_>) {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => kernel.backward(args, grads),
			DynamicDispatchKernel::MultiThreaded(kernel) => kernel.backward(args, grads),
		}
	}

	fn backward_input_row(&self, args: &BackwardArgs<'_>, b: usize, d_in_row: &mut [f32]) {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => {
				kernel.backward_input_row(args, b, d_in_row)
			}
			DynamicDispatchKernel::MultiThreaded(kernel) => {
				kernel.backward_input_row(args, b, d_in_row)
			}
		}
	}

	fn backward_param_row(
		&self,
		args: &BackwardArgs<'_>,
		o: usize,
		d_weight_row: &mut [f32],
		d_bias: Option<&mut f32>,
	) {
		match self {
			DynamicDispatchKernel::SingleThreaded(kernel) => {
				kernel.backward_param_row(args, o, d_weight_row, d_bias)
			}
			DynamicDispatchKernel::MultiThreaded(kernel) => {
				kernel.backward_param_row(args, o, d_weight_row, d_bias)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;
	use crate::{reference, shape::DenseShape};

	#[test]
	fn test_creation() {
		fn make_kernel(thread_settings: ThreadingSettings) -> DynamicDispatchKernel {
			DynamicDispatchKernel::new(KernelOptions {
				isa: None,
				thread_settings,
			})
			.unwrap()
		}

		let kernel = make_kernel(ThreadingSettings::SingleThreaded);
		assert_matches!(kernel, DynamicDispatchKernel::SingleThreaded(_));

		let multithreaded = get_log_max_threads() > 0;
		let kernel = make_kernel(ThreadingSettings::MultithreadedDefault);
		if multithreaded {
			assert_matches!(kernel, DynamicDispatchKernel::MultiThreaded(_));
		} else {
			assert_matches!(kernel, DynamicDispatchKernel::SingleThreaded(_));
		}

		let kernel = make_kernel(ThreadingSettings::ExplicitThreadsCount { log_threads: 2 });
		assert_matches!(
			kernel,
			DynamicDispatchKernel::MultiThreaded(k) if k.log_max_threads() == 2
		);

		let kernel = make_kernel(ThreadingSettings::ExplicitThreadsCount { log_threads: 0 });
		assert_matches!(kernel, DynamicDispatchKernel::SingleThreaded(_));
	}

	#[test]
	fn test_explicit_isa() {
		for isa in Isa::ALL {
			let kernel = DynamicDispatchKernel::new(KernelOptions {
				isa: Some(isa),
				thread_settings: ThreadingSettings::SingleThreaded,
			});
			if isa.is_supported() {
				assert_eq!(kernel.unwrap().isa(), isa);
			} else {
				assert_matches!(kernel, Err(Error::UnsupportedIsa { .. }));
			}
		}
	}

	#[test]
	fn test_threading_settings() {
		assert!(!ThreadingSettings::SingleThreaded.is_multithreaded());
		assert!(ThreadingSettings::MultithreadedDefault.is_multithreaded());
		assert!(!ThreadingSettings::ExplicitThreadsCount { log_threads: 0 }.is_multithreaded());
		let explicit = ThreadingSettings::ExplicitThreadsCount { log_threads: 3 };
		assert_eq!(explicit.log_threads_count(), 3);
		assert_eq!(ThreadingSettings::default().log_threads_count(), 0);
	}

	#[test]
	fn test_oversized_thread_count() {
		let kernel = DynamicDispatchKernel::new(KernelOptions {
			isa: None,
			thread_settings: ThreadingSettings::ExplicitThreadsCount { log_threads: 64 },
		})
		.unwrap();

		let shape = DenseShape::new(2, 1, 1);
		let bias = [0.5];
		let args = ForwardArgs::new(shape, &[1.0, 2.0], &[3.0], Some(&bias[..])).unwrap();
		assert_eq!(reference::run_forward(&kernel, &args), vec![3.5, 6.5]);

		let args = BackwardArgs::new(shape, &[1.0, 1.0], &[1.0, 2.0], &[3.0]).unwrap();
		let (mut d_in, mut d_weight, mut d_bias) = ([0.0; 2], [0.0; 1], [0.0; 1]);
		let mut grads =
			GradBuffers::new(shape, &mut d_in, &mut d_weight, Some(&mut d_bias[..])).unwrap();
		kernel.backward(&args, &mut grads);
		assert_eq!(d_in, [3.0, 3.0]);
		assert_eq!(d_weight, [3.0]);
		assert_eq!(d_bias, [2.0]);
	}
}
