mod case;

pub use case::CaseRow;
