//! services/storefront/src/ui/mod.rs
//!
//! Presentational components for the terminal. Pure formatting over domain
//! records and state snapshots; no requests are issued from here.

pub mod product_card;
pub mod toast;
pub mod wishlist;

pub use product_card::product_card;
pub use toast::{Toast, ToastLevel};
pub use wishlist::wishlist_view;
