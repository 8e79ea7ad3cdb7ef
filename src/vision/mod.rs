pub mod archive;
pub mod folder;
pub mod image_data;

pub use archive::{extract_archive, unpack_single_archive};
pub use folder::{load_image_folder, ImageSet, SUPPORTED_EXTENSIONS};
pub use image_data::{load_image, normalize_pixels, Image};
