use crate::db::log::load_log;
use crate::errors::AppResult;
use ansi_term::Colour;
use rusqlite::Connection;

const MAX_OP_WIDTH: usize = 40;

/// Colour for an audit operation, keyed on its prefix.
fn color_for_operation(op: &str) -> Colour {
    match op {
        "init" => Colour::RGB(255, 153, 51),
        "migration_applied" => Colour::Purple,
        "shift_stop" | "ride_end" => Colour::Cyan,
        other if other.ends_with("_delete") => Colour::Red,
        other if other.ends_with("_edit") || other.ends_with("_restore") => Colour::Yellow,
        other if other.starts_with("sweep_") => Colour::Blue,
        other if other.starts_with("shift_") || other.starts_with("ride_") => Colour::Green,
        _ => Colour::White,
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

pub struct LogLogic;

impl LogLogic {
    pub fn print_log(conn: &Connection) -> AppResult<()> {
        let entries = load_log(conn)?;

        if entries.is_empty() {
            println!("📜 Internal log is empty.");
            return Ok(());
        }

        let id_w = entries
            .iter()
            .map(|(id, ..)| id.to_string().len())
            .max()
            .unwrap_or(1);

        let rows: Vec<(i64, String, String, String, String)> = entries
            .into_iter()
            .map(|(id, raw_date, operation, target, message)| {
                let date = chrono::DateTime::parse_from_rfc3339(&raw_date)
                    .map(|dt| dt.format("%F %T").to_string())
                    .unwrap_or(raw_date);
                let target = if target.is_empty() {
                    String::new()
                } else {
                    format!(" ({target})")
                };
                (id, date, operation, target, message)
            })
            .collect();

        let op_w = rows
            .iter()
            .map(|(_, _, op, target, _)| (op.len() + target.len()).min(MAX_OP_WIDTH))
            .max()
            .unwrap_or(10);

        println!("📜 Internal log:\n");

        for (id, date, op, target, message) in rows {
            // Pad on the plain text; only the operation word is coloured.
            let visible = truncate(&format!("{op}{target}"), MAX_OP_WIDTH);
            let (head, rest) = visible.split_at(op.len().min(visible.len()));
            let padding = " ".repeat(op_w.saturating_sub(visible.chars().count()));

            println!(
                "{:>id_w$}: {} | {}{}{} => {}",
                id,
                date,
                color_for_operation(&op).paint(head),
                rest,
                padding,
                message,
                id_w = id_w
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_targets_are_truncated() {
        assert_eq!(truncate("shift_start", 40), "shift_start");
        let t = truncate(&"x".repeat(50), 10);
        assert_eq!(t, "xxxxxxx...");
    }

    #[test]
    fn operations_map_to_colours() {
        assert_eq!(color_for_operation("shift_delete"), Colour::Red);
        assert_eq!(color_for_operation("ride_edit"), Colour::Yellow);
        assert_eq!(color_for_operation("sweep_shift"), Colour::Blue);
        assert_eq!(color_for_operation("ride_start"), Colour::Green);
    }
}
