pub mod decision;
pub mod wallet;
