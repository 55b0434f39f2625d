pub mod attempt;
pub mod question;
pub mod quiz;
pub mod results;
pub mod user;
