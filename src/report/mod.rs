pub mod tsv;
pub mod reports;
