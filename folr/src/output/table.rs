use folio::prelude::*;

use crate::cli::skills::SkillRow;

pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

pub fn render_table<T: TableRow>(items: &[T]) -> String {
    let headers = T::headers();
    let rows: Vec<Vec<String>> = items.iter().map(TableRow::row).collect();
    let widths = column_widths(headers, &rows);

    let mut out = String::new();
    out.push_str(&format_row(
        &headers.iter().map(ToString::to_string).collect::<Vec<_>>(),
        &widths,
    ));
    out.push('\n');
    out.push_str(&format_separator(&widths));

    for row in rows {
        out.push('\n');
        out.push_str(&format_row(&row, &widths));
    }

    out
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx >= widths.len() {
                widths.push(cell.len());
            } else {
                widths[idx] = widths[idx].max(cell.len());
            }
        }
    }
    widths
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (idx, cell) in row.iter().enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        let width = widths.get(idx).copied().unwrap_or(0);
        let _ = write!(out, "{cell:<width$}");
    }
    out
}

fn format_separator(widths: &[usize]) -> String {
    let mut out = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        out.push_str(&"-".repeat(*width));
    }
    out
}

fn yes_no(value: bool) -> String {
    String::from(if value { "yes" } else { "no" })
}

impl TableRow for Project {
    fn headers() -> &'static [&'static str] {
        &["id", "title", "category", "status", "order", "visible"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.title.clone(),
            self.category.clone(),
            self.status.to_string(),
            self.order.to_string(),
            yes_no(self.visible),
        ]
    }
}

impl TableRow for Certificate {
    fn headers() -> &'static [&'static str] {
        &["id", "title", "issuer", "category", "expires", "visible"]
    }

    fn row(&self) -> Vec<String> {
        let expires = self
            .expiry_date
            .map(|date| date.to_string())
            .unwrap_or_default();
        vec![
            self.id.clone(),
            self.title.clone(),
            self.issuer.clone(),
            self.category.clone(),
            expires,
            yes_no(self.visible),
        ]
    }
}

impl TableRow for Skill {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "category", "visible"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.category.clone(),
            yes_no(self.visible),
        ]
    }
}

impl TableRow for SkillRow {
    fn headers() -> &'static [&'static str] {
        &["name", "category", "source", "source id", "override", "visible"]
    }

    fn row(&self) -> Vec<String> {
        let action = self
            .source_action
            .map(|action| action.to_string())
            .unwrap_or_default();
        vec![
            self.skill.name.clone(),
            self.skill.category.clone(),
            self.skill.source.to_string(),
            self.skill.source_id.clone().unwrap_or_default(),
            action,
            yes_no(self.effective_visible),
        ]
    }
}

impl TableRow for Card {
    fn headers() -> &'static [&'static str] {
        &["id", "kind", "title", "category", "preview", "badge", "visible"]
    }

    fn row(&self) -> Vec<String> {
        let badge = self
            .badge
            .as_ref()
            .map(|badge| badge.text.clone())
            .unwrap_or_default();
        let visible = if self.hidden {
            "hidden".to_string()
        } else {
            yes_no(self.visible)
        };
        vec![
            self.id.clone(),
            self.kind.to_string(),
            self.title.clone(),
            self.category.clone().unwrap_or_default(),
            self.preview.kind().to_string(),
            badge,
            visible,
        ]
    }
}
