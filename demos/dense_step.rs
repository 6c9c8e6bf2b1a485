// Copyright 2025 Irreducible Inc.

use std::{iter::repeat_with, time::Instant};

use anyhow::Result;
use clap::{value_parser, Parser, ValueEnum};
use dense_kernels::{
	DenseKernel, DynamicDispatchKernel, Isa, KernelOptions, Linear, ThreadingSettings,
};
use dense_utils::{rayon::adjust_thread_pool, tracing::init_tracing};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IsaArg {
	Scalar,
	Avx2,
	Neon,
}

impl From<IsaArg> for Isa {
	fn from(isa: IsaArg) -> Self {
		match isa {
			IsaArg::Scalar => Isa::Scalar,
			IsaArg::Avx2 => Isa::Avx2,
			IsaArg::Neon => Isa::Neon,
		}
	}
}

#[derive(Debug, Parser)]
struct Args {
	/// Number of samples in the batch.
	#[arg(short, long, default_value_t = 64, value_parser = value_parser!(u32).range(1..))]
	batch: u32,
	/// Width of an input row.
	#[arg(long, default_value_t = 784)]
	n_in: usize,
	/// Width of an output row.
	#[arg(long, default_value_t = 128)]
	n_out: usize,
	/// Build the layer without a bias.
	#[arg(long)]
	no_bias: bool,
	/// Maximum number of worker threads, rounded up to a power of two. The pool size when unset.
	#[arg(long, value_parser = value_parser!(u32).range(1..))]
	threads: Option<u32>,
	/// Instruction set, detected from the CPU when unset.
	#[arg(long, value_enum)]
	isa: Option<IsaArg>,
	/// Seed of the parameter and data generator.
	#[arg(long, default_value_t = 0)]
	seed: u64,
}

fn main() -> Result<()> {
	adjust_thread_pool()
		.as_ref()
		.expect("failed to init thread pool");

	let args = Args::parse();

	init_tracing();

	let thread_settings = match args.threads {
		Some(threads) => ThreadingSettings::ExplicitThreadsCount {
			log_threads: threads.next_power_of_two().ilog2() as usize,
		},
		None => ThreadingSettings::MultithreadedDefault,
	};
	let kernel = DynamicDispatchKernel::new(KernelOptions {
		isa: args.isa.map(Isa::from),
		thread_settings,
	})?;

	let mut rng = StdRng::seed_from_u64(args.seed);
	let mut layer = Linear::new(args.n_in, args.n_out, !args.no_bias, kernel)?;
	layer.init_uniform(&mut rng);

	let batch = args.batch as usize;
	let input = repeat_with(|| rng.gen_range(-1.0f32..1.0))
		.take(batch * args.n_in)
		.collect::<Vec<_>>();

	println!(
		"Running dense step b={batch} i={} o={} isa={:?} threads=2^{}",
		args.n_in,
		args.n_out,
		layer.kernel().isa(),
		thread_settings.log_threads_count(),
	);

	let start = Instant::now();
	let out = layer.forward(&input)?;
	let forward_time = start.elapsed();

	// Gradient of the loss `0.5 * Σ out^2`.
	let d_out = out.clone();
	let start = Instant::now();
	let d_in = layer.backward(&input, &d_out)?;
	let backward_time = start.elapsed();

	let loss = 0.5 * out.iter().map(|&x| x as f64 * x as f64).sum::<f64>();
	let grad_norm = layer
		.weight_grad()
		.iter()
		.chain(layer.bias_grad().unwrap_or_default())
		.map(|&g| g as f64 * g as f64)
		.sum::<f64>()
		.sqrt();
	tracing::info!(loss, grad_norm, d_in_len = d_in.len(), "finished dense step");

	println!("forward: {forward_time:?}, backward: {backward_time:?}");
	println!("loss: {loss:.6}, parameter gradient norm: {grad_norm:.6}");

	Ok(())
}
