//! Business logic services for the API.
//!
//! # Services
//!
//! - `auth` - Registration, login, password changes and session tokens
//! - `catalog` - Product listing, search and management
//! - `cart` - Cart aggregate (merge, update, remove, view)
//! - `checkout` - Order assembly and order status lifecycle
//! - `media` - Product image uploads to the media host
//!
//! Services borrow repositories for the duration of a request and hold no
//! state of their own.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod media;
