//! services/storefront/src/ui/wishlist.rs

use storefront_core::domain::WishlistItem;

use super::product_card::format_price;

pub fn wishlist_view(items: &[WishlistItem]) -> String {
    if items.is_empty() {
        return "Your wishlist is empty.".to_string();
    }
    let mut lines = vec![format!("Wishlist ({} items)", items.len())];
    lines.extend(items.iter().map(|item| {
        format!(
            "  {}  {}  (saved {})  id: {}",
            item.product.name,
            format_price(item.product.price),
            item.added_at.format("%Y-%m-%d"),
            item.product.id
        )
    }));
    lines.join("\n")
}
