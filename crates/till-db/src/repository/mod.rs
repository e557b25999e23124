//! # Repository Implementations
//!
//! One repository per aggregate:
//! - [`product::ProductRepository`] - catalog reads, stock writes
//! - [`sale::SaleRepository`] - sale aggregates and the invoice counter
//!
//! Both implement the corresponding till-engine storage trait, so they plug
//! straight into a `SaleEngine`.

pub mod product;
pub mod sale;
