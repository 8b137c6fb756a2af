//! Instance file readers.

mod solomon;

pub use solomon::{list_instance_files, parse_solomon, read_solomon, read_solomon_file};
