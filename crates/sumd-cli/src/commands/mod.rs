pub mod distance;
pub mod run;
