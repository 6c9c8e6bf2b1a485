// Copyright 2023-2025 Irreducible Inc.

use tracing_subscriber::{
	filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Installs the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG` and defaults to `info`. Installing twice is not an error,
/// the second call leaves the first subscriber in place.
pub fn init_tracing() {
	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::INFO.into())
		.from_env_lossy();

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init();
}
