// Shared terminal rendering helpers: separators, boxed summaries, tables and
// human-friendly durations. Tables go to stdout, everything else to stderr
// like the log macros.

use colored::Colorize;
use prettytable::{Cell, Row, Table, format};

use crate::libs::run_mode::RunMode;

pub fn separator() {
    eprintln!("{}", "=".repeat(60).bright_blue());
}

/// Draws a titled box around `lines`.
pub fn print_box(mode: RunMode, title: &str, lines: &[String]) {
    if !mode.shows_chrome() {
        return;
    }
    let width = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count() + 2))
        .max()
        .unwrap_or(0)
        + 2;

    let title_text = format!(" {} ", title);
    let fill = width.saturating_sub(title_text.chars().count());
    eprintln!(
        "╭{}{}╮",
        title_text.bold().cyan(),
        "─".repeat(fill)
    );
    for line in lines {
        let pad = width - line.chars().count() - 1;
        eprintln!("│ {}{}│", line, " ".repeat(pad));
    }
    eprintln!("╰{}╯", "─".repeat(width));
}

/// Builds a table with a bold header row and no inner line separators.
pub fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(
        headers.iter().map(|h| Cell::new(h).style_spec("bFc")).collect(),
    ));
    for row in rows {
        table.add_row(Row::new(row.iter().map(|c| Cell::new(c)).collect()));
    }
    table
}

/// Splits `"Tool: instructions"` help strings into the two-column manual
/// installation table shown when the user declines automatic installation.
pub fn manual_instructions_rows(help: &[String]) -> Vec<Vec<String>> {
    help.iter()
        .map(|line| match line.split_once(": ") {
            Some((tool, instructions)) => vec![tool.to_string(), instructions.to_string()],
            None => vec![String::new(), line.clone()],
        })
        .collect()
}

pub fn print_manual_instructions(help: &[String]) {
    eprintln!();
    crate::log_info!("Installation skipped. Here are manual installation instructions:");
    table(
        &["Tool", "Installation Instructions"],
        manual_instructions_rows(help),
    )
    .printstd();
}

/// Minutes below an hour, hours with one decimal below a day, days above.
pub fn format_age(age: chrono::Duration) -> String {
    let minutes = age.num_minutes().max(0);
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 24 * 60 {
        format!("{:.1}h", minutes as f64 / 60.0)
    } else {
        format!("{}d", age.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_rows_split_on_first_separator() {
        let rows = manual_instructions_rows(&[
            "Helm: brew install helm".to_string(),
            "Git: see https://git-scm.com: pick your OS".to_string(),
            "no separator".to_string(),
        ]);
        assert_eq!(rows[0], vec!["Helm", "brew install helm"]);
        assert_eq!(rows[1], vec!["Git", "see https://git-scm.com: pick your OS"]);
        assert_eq!(rows[2], vec!["", "no separator"]);
    }

    #[test]
    fn ages_pick_their_unit() {
        assert_eq!(format_age(chrono::Duration::minutes(42)), "42m");
        assert_eq!(format_age(chrono::Duration::minutes(90)), "1.5h");
        assert_eq!(format_age(chrono::Duration::days(3)), "3d");
        assert_eq!(format_age(chrono::Duration::minutes(-5)), "0m");
    }
}
