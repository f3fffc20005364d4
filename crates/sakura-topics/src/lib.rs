//! Canonical event topic constants shared across theme components.
//!
//! Publishers and subscribers both import from here so a renamed topic
//! breaks at compile time instead of silently dropping events.
//! Keep this list grouped by domain and favor `domain:kebab-case` names.

// Cart
pub const TOPIC_CART_ADD_ITEM: &str = "cart:add-item";
pub const TOPIC_CART_REMOVE_ITEM: &str = "cart:remove-item";
pub const TOPIC_CART_UPDATE_ITEM: &str = "cart:update-item";
pub const TOPIC_CART_QUANTITY_CHANGE: &str = "cart:quantity-change";

// Product
pub const TOPIC_PRODUCT_QUANTITY_CHANGE: &str = "product:quantity-change";
pub const TOPIC_PRODUCT_VARIANT_CHANGE: &str = "product:variant-change";
pub const TOPIC_PRODUCT_VARIANT_UNAVAILABLE: &str = "product:variant-unavailable";
pub const TOPIC_PRODUCT_INFO_LOADING: &str = "product:info-loading";

// Filter
pub const TOPIC_FILTER_CHANGE: &str = "filter:change";

// Recommendations
pub const TOPIC_RECOMMENDATION_LOAD: &str = "recommendation:load";

pub const CART_TOPICS: &[&str] = &[
    TOPIC_CART_ADD_ITEM,
    TOPIC_CART_REMOVE_ITEM,
    TOPIC_CART_UPDATE_ITEM,
    TOPIC_CART_QUANTITY_CHANGE,
];

pub const PRODUCT_TOPICS: &[&str] = &[
    TOPIC_PRODUCT_QUANTITY_CHANGE,
    TOPIC_PRODUCT_VARIANT_CHANGE,
    TOPIC_PRODUCT_VARIANT_UNAVAILABLE,
    TOPIC_PRODUCT_INFO_LOADING,
];

pub const FILTER_TOPICS: &[&str] = &[TOPIC_FILTER_CHANGE];

pub const RECOMMENDATION_TOPICS: &[&str] = &[TOPIC_RECOMMENDATION_LOAD];

/// Every known topic, grouped by domain in declaration order.
pub const ALL_TOPICS: &[&str] = &[
    TOPIC_CART_ADD_ITEM,
    TOPIC_CART_REMOVE_ITEM,
    TOPIC_CART_UPDATE_ITEM,
    TOPIC_CART_QUANTITY_CHANGE,
    TOPIC_PRODUCT_QUANTITY_CHANGE,
    TOPIC_PRODUCT_VARIANT_CHANGE,
    TOPIC_PRODUCT_VARIANT_UNAVAILABLE,
    TOPIC_PRODUCT_INFO_LOADING,
    TOPIC_FILTER_CHANGE,
    TOPIC_RECOMMENDATION_LOAD,
];

/// Domain prefix of a topic (`"cart"` for `"cart:add-item"`).
///
/// Returns `None` when the topic has no `:` separator or an empty prefix.
pub fn domain(topic: &str) -> Option<&str> {
    match topic.split_once(':') {
        Some((prefix, _)) if !prefix.is_empty() => Some(prefix),
        _ => None,
    }
}

pub fn is_known(topic: &str) -> bool {
    ALL_TOPICS.contains(&topic)
}

/// Known topics belonging to `domain`, in declaration order.
pub fn topics_in(domain: &str) -> &'static [&'static str] {
    match domain {
        "cart" => CART_TOPICS,
        "product" => PRODUCT_TOPICS,
        "filter" => FILTER_TOPICS,
        "recommendation" => RECOMMENDATION_TOPICS,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_topics_are_unique() {
        let unique: HashSet<_> = ALL_TOPICS.iter().collect();
        assert_eq!(unique.len(), ALL_TOPICS.len());
    }

    #[test]
    fn domain_groups_cover_every_topic() {
        let grouped: usize = ["cart", "product", "filter", "recommendation"]
            .iter()
            .map(|d| topics_in(d).len())
            .sum();
        assert_eq!(grouped, ALL_TOPICS.len());
        for topic in ALL_TOPICS {
            let d = domain(topic).expect("every topic has a domain");
            assert!(topics_in(d).contains(topic), "{topic} missing from {d}");
        }
    }

    #[test]
    fn domain_rejects_unscoped_topics() {
        assert_eq!(domain("cart:add-item"), Some("cart"));
        assert_eq!(domain("plain"), None);
        assert_eq!(domain(":orphan"), None);
        assert!(topics_in("unknown").is_empty());
        assert!(!is_known("cart:unknown"));
    }
}
