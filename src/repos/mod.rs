pub mod error;
pub mod principal_repo;
pub mod resource_repo;
