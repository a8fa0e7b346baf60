pub mod audit;
pub mod credential;
pub mod gate;
pub mod policy;
pub mod rate_limit;
pub mod token;
pub mod validate;
