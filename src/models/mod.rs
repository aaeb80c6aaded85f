pub mod entities;
pub mod errors;
pub mod memory;
pub mod responses;
pub mod storage;
