// Store-specific response parsing

pub mod play_store_parser;

pub use play_store_parser::{Parser, PlayStoreParser, ReviewPage};
