pub mod nearby;
pub mod recommend;
pub mod regions;
