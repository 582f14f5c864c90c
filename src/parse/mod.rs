pub mod isbn;
pub mod line_parser;
