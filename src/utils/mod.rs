pub mod environment;
pub mod paths;
pub mod terminal;

pub use environment::{default_data_dir, env_non_empty, env_parse};
pub use paths::{MAX_EXPORT_BYTES, format_path_with_tilde, validate_file_size};
pub use terminal::{display_line, strip_ansi_codes};
