pub mod supervisor;
pub mod tailer;
