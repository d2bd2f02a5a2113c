pub mod blocked_by;
pub mod config;
pub mod crossref;
pub mod labels;
pub mod types;
