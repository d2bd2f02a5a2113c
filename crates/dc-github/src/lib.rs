pub mod client;
pub mod host;
pub mod mappers;
pub mod patch;
pub mod retry;
pub mod revisions;
pub mod specs;
pub mod work_items;
