pub mod capture;
pub mod document;
