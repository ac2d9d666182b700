pub mod bucket;
pub mod rest;

pub use bucket::BucketObjectStore;
pub use rest::RestStore;
