pub mod label;
pub mod palette;

pub use label::{empty_label, line_label, status_text};
pub use palette::ColorCache;
