pub mod demo;
pub mod dump;
pub mod run;
