//! Date and text filters available to every theme template.
//!
//! Dates stay plain `YYYY-MM-DD` / `YYYY-MM` strings; these filters only
//! reformat them. Anything that does not parse is returned unchanged.

use std::collections::HashMap;

use tera::{Tera, Value};

const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_ES: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];
const MONTHS_IT: [&str; 12] = [
    "Gen", "Feb", "Mar", "Apr", "Mag", "Giu", "Lug", "Ago", "Set", "Ott", "Nov", "Dic",
];

pub fn register(tera: &mut Tera) {
    tera.register_filter("month_year", month_year_filter);
    tera.register_filter("date_archive", date_archive_filter);
    tera.register_filter("date_full", date_full_filter);
    tera.register_filter("year", year_filter);
    tera.register_filter("strip_whitespace", strip_whitespace_filter);
}

fn months(lang: &str) -> &'static [&'static str; 12] {
    match lang {
        "es" => &MONTHS_ES,
        "it" => &MONTHS_IT,
        _ => &MONTHS_EN,
    }
}

fn month_name(month: &str, lang: &str) -> Option<&'static str> {
    let index: usize = month.parse().ok()?;
    months(lang).get(index.checked_sub(1)?).copied()
}

/// `2024-01` → `Jan 2024`
pub fn month_year(date: &str, lang: &str) -> String {
    let mut parts = date.split('-');
    match (parts.next(), parts.next()) {
        (Some(year), Some(month)) => match month_name(month, lang) {
            Some(name) => format!("{} {}", name, year),
            None => date.to_string(),
        },
        _ => date.to_string(),
    }
}

/// `2025-11-07` → `Nov 07`
pub fn date_archive(date: &str, lang: &str) -> String {
    match split_day(date, lang) {
        Some((_, month, day)) => format!("{} {:02}", month, day),
        None => date.to_string(),
    }
}

/// `2025-11-07` → `Nov 07, 2025`
pub fn date_full(date: &str, lang: &str) -> String {
    match split_day(date, lang) {
        Some((year, month, day)) => format!("{} {:02}, {}", month, day, year),
        None => date.to_string(),
    }
}

pub fn year(date: &str) -> String {
    date.split('-').next().unwrap_or_default().to_string()
}

pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn split_day<'a>(date: &'a str, lang: &str) -> Option<(&'a str, &'static str, u32)> {
    let parts: Vec<&str> = date.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    let month = month_name(parts[1], lang)?;
    let day: u32 = parts[2].parse().ok()?;
    Some((parts[0], month, day))
}

fn lang_arg(args: &HashMap<String, Value>) -> String {
    args.get("lang")
        .and_then(Value::as_str)
        .unwrap_or("en")
        .to_string()
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn month_year_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(month_year(&as_text(value), &lang_arg(args))))
}

fn date_archive_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(date_archive(&as_text(value), &lang_arg(args))))
}

fn date_full_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(date_full(&as_text(value), &lang_arg(args))))
}

fn year_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(year(&as_text(value))))
}

fn strip_whitespace_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(strip_whitespace(&as_text(value))))
}
