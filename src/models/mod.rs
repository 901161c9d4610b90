pub mod availability;
pub mod decision;
pub mod meeting;
