use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitplat_core::models::FoodResult;

/// Diary date for a summary: `YYYY-MM-DD`, `today` or `yesterday` (default today).
pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    let Some(s) = date_str else {
        return Ok(today);
    };
    match s.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - chrono::Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")),
    }
}

pub(crate) fn print_food_table(foods: &[FoodResult]) {
    println!("{}", food_table(foods));
}

fn food_table(foods: &[FoodResult]) -> String {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Brand")]
        brand: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fat: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let n = f.nutrition.as_ref();
            FoodRow {
                idx: i + 1,
                id: f.id.map_or("-".into(), |id| id.to_string()),
                name: truncate(&f.name, 35),
                brand: f
                    .brand
                    .as_deref()
                    .map(|b| truncate(b, 20))
                    .unwrap_or_default(),
                calories: n.map_or("-".into(), |n| format!("{:.0}", n.calories)),
                protein: n.map_or("-".into(), |n| format!("{:.1}", n.protein_g)),
                carbs: n.map_or("-".into(), |n| format!("{:.1}", n.carbs_g)),
                fat: n.map_or("-".into(), |n| format!("{:.1}", n.fat_g)),
                source: f.source.to_string(),
            }
        })
        .collect();

    Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string()
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
