// Processing stages: candidate scanning, classification, validity checks, dedup

pub mod classifier;
pub mod dedup;
pub mod scanner;
pub mod validity;
