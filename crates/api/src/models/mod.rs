//! Domain models for the API.
//!
//! These types represent validated domain objects, separate from database row
//! types (see `db::postgres`) and from request payloads (see `routes`).

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use cart::{CartItemView, CartLine, CartView};
pub use order::{Order, OrderDraft, OrderLine, ShippingAddress, StockShortfall, order_total};
pub use product::{NewProduct, Product, ProductFilter, ProductSort, ProductUpdate};
pub use session::{CurrentUser, SessionInfo};
pub use user::{NewUser, User};
