// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod config;
pub mod counter;
pub mod error;
pub mod event;
pub mod output;
pub mod pattern;
pub mod persistence;
pub mod runtime;
