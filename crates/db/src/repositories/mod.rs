mod case_repository;

pub use case_repository::*;
