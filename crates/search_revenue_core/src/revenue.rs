//! Purchase detection and product list revenue parsing.
//!
//! `product_list` holds comma separated items, each a semicolon separated
//! `category;product;quantity;revenue;...` tuple.

/// Zero-based position of the revenue field inside one product entry.
pub const REVENUE_FIELD_INDEX: usize = 3;

/// Revenue summed from one product list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedRevenue {
    pub total: f64,
    pub items_counted: u64,
    pub bad_values: u64,
}

/// True when any comma separated code in `event_list` equals `purchase_code`.
pub fn is_purchase(event_list: &str, purchase_code: &str) -> bool {
    event_list
        .split(',')
        .any(|code| code.trim() == purchase_code)
}

/// Sums item revenue; a bad item is counted and skipped, never fatal for the row.
pub fn parse_purchase_revenue(product_list: &str) -> ParsedRevenue {
    let mut parsed = ParsedRevenue::default();

    for item in product_list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
    {
        match item_revenue(item) {
            Some(revenue) => {
                parsed.total += revenue;
                parsed.items_counted += 1;
            }
            None => parsed.bad_values += 1,
        }
    }

    parsed
}

fn item_revenue(item: &str) -> Option<f64> {
    let raw = item.split(';').nth(REVENUE_FIELD_INDEX)?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}
