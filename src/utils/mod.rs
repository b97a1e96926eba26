//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities
//! - File-backed loss and image logging
//! - Image grid helpers

pub mod checkpoint;
pub mod config;
pub mod image;
pub mod logger;

pub use checkpoint::{
    checkpoint_name, find_latest_checkpoint, list_checkpoints, load_checkpoint,
    load_checkpoint_meta, save_checkpoint, CheckpointMeta, CheckpointStore,
};
pub use config::{ensure_config_exists, Config, ModelConfig};
pub use image::{denormalize, image_grid, reshape_images, save_image};
pub use logger::FileLogger;
