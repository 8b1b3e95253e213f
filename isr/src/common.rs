//! Common utilities for isr.

pub use common::buffer2::Buffer2;
