pub mod loader;

pub use loader::{ImageLoader, MAX_IMAGE_BYTES};
