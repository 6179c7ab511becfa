pub mod airquality;
pub mod printer;
