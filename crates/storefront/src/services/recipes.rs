//! Cross-linking between products and recipe posts by shared tags.
//!
//! Catalogs and blogs here are small (hundreds of items), so a linear scan
//! per page view is fine.

use std::collections::HashSet;

use crate::services::cms::BlogPost;
use crate::shopify::types::Product;

fn normalized(tags: &[String]) -> HashSet<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn overlap(wanted: &HashSet<String>, tags: &[String]) -> usize {
    normalized(tags)
        .iter()
        .filter(|t| wanted.contains(*t))
        .count()
}

/// Posts sharing the most tags with a product.
///
/// Posts with no shared tag are left out. Ties go to the newest post.
#[must_use]
pub fn suggest<'a>(
    product_tags: &[String],
    posts: &'a [BlogPost],
    limit: usize,
) -> Vec<&'a BlogPost> {
    let wanted = normalized(product_tags);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &BlogPost)> = posts
        .iter()
        .map(|p| (overlap(&wanted, &p.tags), p))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|(sa, pa), (sb, pb)| sb.cmp(sa).then(pb.published_at.cmp(&pa.published_at)));
    scored.into_iter().take(limit).map(|(_, p)| p).collect()
}

/// Products sharing the most tags with a post.
///
/// Products with no shared tag are left out. Ties keep catalog order.
#[must_use]
pub fn related_products<'a>(
    post_tags: &[String],
    products: &'a [Product],
    limit: usize,
) -> Vec<&'a Product> {
    let wanted = normalized(post_tags);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &Product)> = products
        .iter()
        .map(|p| (overlap(&wanted, &p.tags), p))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|(sa, _), (sb, _)| sb.cmp(sa));
    scored.into_iter().take(limit).map(|(_, p)| p).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn post(slug: &str, tag_list: &[&str], day: u32) -> BlogPost {
        BlogPost {
            slug: slug.to_string(),
            title: slug.to_string(),
            excerpt: None,
            author: None,
            published_at: Utc.with_ymd_and_hms(2026, 5, day, 0, 0, 0).unwrap(),
            updated_at: None,
            featured_image: None,
            tags: tags(tag_list),
            content_html: String::new(),
            reading_time_minutes: 1,
        }
    }

    fn product(handle: &str, tag_list: &[&str]) -> Product {
        Product {
            handle: handle.to_string(),
            tags: tags(tag_list),
            ..Product::default()
        }
    }

    #[test]
    fn test_suggest_ranks_by_overlap_then_recency() {
        let posts = vec![
            post("old-rye", &["rye"], 1),
            post("rye-and-spelt", &["Rye", "spelt"], 2),
            post("new-rye", &["rye"], 9),
            post("cake", &["sugar"], 10),
        ];
        let picked = suggest(&tags(&["rye", "SPELT"]), &posts, 3);
        let slugs: Vec<&str> = picked.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["rye-and-spelt", "new-rye", "old-rye"]);
    }

    #[test]
    fn test_suggest_excludes_unrelated_and_respects_limit() {
        let posts = vec![post("a", &["rye"], 1), post("b", &["rye"], 2)];
        assert!(suggest(&tags(&["oats"]), &posts, 5).is_empty());
        assert!(suggest(&[], &posts, 5).is_empty());
        assert_eq!(suggest(&tags(&["rye"]), &posts, 1).len(), 1);
    }

    #[test]
    fn test_related_products_keeps_catalog_order_on_ties() {
        let products = vec![
            product("flour", &["rye"]),
            product("salt", &["salt"]),
            product("starter", &["rye", "sourdough"]),
            product("banneton", &["sourdough"]),
        ];
        let picked = related_products(&tags(&["rye", "sourdough"]), &products, 10);
        let handles: Vec<&str> = picked.iter().map(|p| p.handle.as_str()).collect();
        assert_eq!(handles, ["starter", "flour", "banneton"]);
    }
}
