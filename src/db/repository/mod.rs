pub mod cleaned_course;
pub mod prescription;
pub mod reminder;

pub use cleaned_course::*;
pub use prescription::*;
pub use reminder::*;
