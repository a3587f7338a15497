#[macro_use]
mod macros;

pub mod codegen;
pub mod driver;
pub mod error;
pub mod lex;
pub mod link;
pub mod parse;
pub mod peephole;
pub mod preprocess;
pub mod source;
pub mod style;
pub mod vendor;

pub mod target {
    pub use crate::link::{Endian, Format, LinkContext};
    pub use crate::vendor::{Vendor, Width};
}
