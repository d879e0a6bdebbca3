pub mod types;
pub mod parser;
pub mod store;

pub use types::*;
pub use parser::{parse_blame_output, parse_porcelain};
pub use store::AnnotationStore;
