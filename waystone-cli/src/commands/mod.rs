pub mod cache;
pub mod serve;
