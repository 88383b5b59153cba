pub mod errors;
pub mod order;
pub mod validation;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod testing;

pub use errors::OrderRejection;
pub use order::{Delivery, Item, Order, Payment};
pub use validation::OrderValidator;
