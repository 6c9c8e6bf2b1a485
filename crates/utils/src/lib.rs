// Copyright 2024-2025 Irreducible Inc.

//! Ambient helpers shared by the dense kernel crates: environment flags, thread pool setup,
//! tracing initialization and early-return macros.

pub mod env;
pub mod error_utils;
pub mod rayon;
pub mod tracing;
