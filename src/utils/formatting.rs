//! Formatting utilities used for CLI outputs.

/// Cents → `12.34`.
pub fn cents2readable(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let c = cents.abs();
    format!("{}{}.{:02}", sign, c / 100, c % 100)
}

pub fn km2readable(km: f64) -> String {
    format!("{:.1} km", km)
}

pub fn optional<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "--".to_string())
}
