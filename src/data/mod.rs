//! Data module for feeding real images to the trainer
//!
//! This module provides:
//! - The `BatchSource` seam the trainer pulls batches through
//! - An in-memory image DataLoader, optionally filled from an image folder

mod loader;

pub use loader::{BatchSource, ImageDataLoader};
