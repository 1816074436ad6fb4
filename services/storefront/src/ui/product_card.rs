//! services/storefront/src/ui/product_card.rs
//!
//! Terminal rendering of a catalog product.

use storefront_core::domain::{Product, Variation};

pub fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}

fn format_rating(rating: Option<f32>) -> String {
    match rating {
        Some(r) => {
            let stars = r.clamp(0.0, 5.0).round() as usize;
            format!("{}{} {:.1}", "★".repeat(stars), "☆".repeat(5 - stars), r)
        }
        None => "no ratings yet".to_string(),
    }
}

fn format_variation(variation: &Variation) -> String {
    format!("{}: {}", variation.name, variation.options.join(" / "))
}

/// One card: a title line, then category and rating, then one line per variation.
pub fn product_card(product: &Product) -> String {
    let mut lines = vec![
        format!("{}  {}", product.name, format_price(product.price)),
        format!(
            "  {} · {}",
            if product.category.is_empty() {
                "uncategorized"
            } else {
                product.category.as_str()
            },
            format_rating(product.rating)
        ),
    ];
    lines.extend(
        product
            .variations
            .iter()
            .filter(|v| !v.options.is_empty())
            .map(|v| format!("  {}", format_variation(v))),
    );
    lines.push(format!("  id: {}", product.id));
    lines.join("\n")
}
