pub mod color;
pub mod fanin;
pub mod format;
pub mod output;
