//! Heuristic structuring of OCR'd menu text.
//!
//! A line whose last token is a price becomes an item; any other non-empty
//! line starts a new section.

use super::entities::MenuItem;

pub fn parse_menu_text(text: &str) -> Vec<MenuItem> {
    let mut items = Vec::new();
    let mut section: Option<String> = None;

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match split_priced_line(line) {
            Some((name, price)) => items.push(MenuItem {
                section: section.clone(),
                name,
                price,
            }),
            None => section = Some(line.to_string()),
        }
    }

    items
}

fn split_priced_line(line: &str) -> Option<(String, f64)> {
    let (head, last) = line.rsplit_once(char::is_whitespace)?;
    let price = parse_price(last)?;

    let name = head
        .trim_end_matches(|c: char| c == '.' || c == '-' || c == '…' || c.is_whitespace())
        .trim();
    if name.is_empty() || parse_price(name).is_some() {
        return None;
    }

    Some((name.to_string(), price))
}

fn parse_price(token: &str) -> Option<f64> {
    let token = token.strip_prefix('$').unwrap_or(token);
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    token.parse::<f64>().ok().filter(|price| price.is_finite())
}
