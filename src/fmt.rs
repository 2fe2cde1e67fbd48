/// Format a float as a Brazilian real amount: R$ 1.234,56
pub fn money(val: f64) -> String {
    let negative = val < 0.0 && format!("{:.2}", val.abs()) != "0.00";
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-R$ {grouped},{dec_part}")
    } else {
        format!("R$ {grouped},{dec_part}")
    }
}

/// Percentage with two decimals, or "N/A" when absent.
pub fn percent(val: Option<f64>) -> String {
    match val {
        Some(v) => format!("{v:.2}%"),
        None => "N/A".to_string(),
    }
}
