// Copyright 2024-2025 Irreducible Inc.

use std::{env, sync::OnceLock};

/// In case when number of threads is set to 1, use rayon thread pool with
/// `use_current_thread` set to true, so that single-threaded runs keep the kernels on the
/// calling thread and profiles stay free of pool noise.
///
/// NOTE: rayon doesn't allow initializing global thread pool several times, so
/// in case when it was initialized before this function returns an error.
/// The typical usage of the function is to place its call in the beginning of the `main`.
/// The function returns reference to the result because `ThreadPoolBuildError`
/// doesn't implement `Clone`.
pub fn adjust_thread_pool() -> &'static Result<(), rayon::ThreadPoolBuildError> {
	static ONCE_GUARD: OnceLock<Result<(), rayon::ThreadPoolBuildError>> = OnceLock::new();

	ONCE_GUARD.get_or_init(|| {
		// We cannot use `rayon::current_num_threads` because it would force the global thread
		// pool to initialize, so we won't be able to override it.
		match env::var("RAYON_NUM_THREADS") {
			Ok(v) if v == "1" => rayon::ThreadPoolBuilder::new()
				.num_threads(1)
				.use_current_thread()
				.build_global(),
			_ => Ok(()),
		}
	})
}

/// Returns the base-2 logarithm of the number of threads that should be used for the task
pub fn get_log_max_threads() -> usize {
	(2 * rayon::current_num_threads() - 1).ilog2() as _
}

/// Minimum number of units per rayon job so that `n_units` are split into at most
/// `2^log_max_threads` jobs. A `log_max_threads` of `usize::BITS` or more saturates.
pub fn min_units_per_job(n_units: usize, log_max_threads: usize) -> usize {
	let max_jobs = u32::try_from(log_max_threads)
		.ok()
		.and_then(|log| 1usize.checked_shl(log))
		.unwrap_or(usize::MAX);
	n_units.div_ceil(max_jobs).max(1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_min_units_per_job() {
		assert_eq!(min_units_per_job(0, 3), 1);
		assert_eq!(min_units_per_job(7, 0), 7);
		assert_eq!(min_units_per_job(16, 2), 4);
		assert_eq!(min_units_per_job(17, 2), 5);
		assert_eq!(min_units_per_job(3, 4), 1);
	}

	#[test]
	fn test_min_units_per_job_saturates() {
		let bits = usize::BITS as usize;
		assert_eq!(min_units_per_job(10, bits - 1), 1);
		assert_eq!(min_units_per_job(10, bits), 1);
		assert_eq!(min_units_per_job(usize::MAX, bits + 7), 1);
		assert_eq!(min_units_per_job(0, usize::MAX), 1);
	}

	#[test]
	fn test_log_max_threads_covers_pool() {
		let log_threads = get_log_max_threads();
		assert!(1 << log_threads >= rayon::current_num_threads());
	}
}
