//! The `.fz` textual knowledge-base format: a line-oriented DSL with
//! `#` comments and quote-grouped tokens, plus its serializer.

pub mod parser;
pub mod writer;

pub use parser::{parse_fz, parse_str};
pub use writer::{save_fz, serialize_kb};
