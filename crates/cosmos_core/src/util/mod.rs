//! Small value helpers shared by model and bootstrap code.

pub mod transform;
