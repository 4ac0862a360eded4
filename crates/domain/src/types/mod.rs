//! Domain types and models

pub mod connector;
pub mod retail;
pub mod wishlist;

pub use connector::{AdapterKind, ConnectorConfig, ConnectorKey, ConnectorMetadata};
pub use retail::{Order, OrderLine, OrderStatus, Product, ProductQuery};
pub use wishlist::{Wishlist, WishlistItem};
