pub mod attribute;
pub mod optimize;
pub mod scenarios;
