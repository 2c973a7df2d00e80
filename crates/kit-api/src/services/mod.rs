//! Business operations shared by the HTTP handlers.

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payments;

pub use cart::{CartLineView, CartService, CartView};
pub use checkout::{CheckoutRequest, CheckoutResult, CheckoutService};
pub use orders::OrderService;
pub use payments::{EventOutcome, PaymentEventProcessor};
