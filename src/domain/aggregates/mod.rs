//! Aggregates module
//!
//! The persisted documents and their pure transitions. Stores derive the next
//! whole document here and write it back; nothing in this module does I/O.
pub mod address;
pub mod cart;
pub mod order;
pub mod wishlist;

pub use address::{Address, AddressBookDocument, AddressDraft};
pub use cart::{CartDocument, CartItem, MAX_UNIT_PRICE};
pub use order::{Order, OrderHistoryDocument, OrderLine, OrderStatus, PaymentMethod};
pub use wishlist::WishlistDocument;
