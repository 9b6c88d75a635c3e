pub mod dataset;
pub mod text;
pub mod wfdb;
