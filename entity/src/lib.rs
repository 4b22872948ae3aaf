//! `SeaORM` entities for the purchase verifier

pub mod prelude;

pub mod documents;
