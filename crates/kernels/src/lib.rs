// Copyright 2024-2025 Irreducible Inc.

//! Forward and backward kernels of a dense (fully connected) layer over `f32` buffers.
//!
//! The forward pass computes `Out = In · Weight^T + Bias` with the weight stored as `[O, I]`.
//! The backward pass accumulates the input, weight and bias gradients. Besides whole-buffer
//! entry points, the kernels expose units with disjoint destinations which a parallel-for can
//! run concurrently without locks, see [`partition`].

pub mod arch;
mod dense_kernel;
mod dynamic_dispatch;
mod error;
mod linear;
mod multithreaded;
pub mod partition;
#[cfg(test)]
mod reference;
mod shape;
mod single_threaded;

pub use arch::Isa;
pub use dense_kernel::DenseKernel;
pub use dynamic_dispatch::{DynamicDispatchKernel, KernelOptions, ThreadingSettings};
pub use error::Error;
pub use linear::{Linear, LAYER_WIDTH_RANGE};
pub use multithreaded::MultithreadedKernel;
pub use shape::{BackwardArgs, DenseShape, ForwardArgs, GradBuffers, OutputBuffer};
pub use single_threaded::SingleThreadedKernel;
