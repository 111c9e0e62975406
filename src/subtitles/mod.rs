pub mod srt;

pub use srt::{format_timestamp, parse_srt_file, parse_srt_str, parse_timestamp};
