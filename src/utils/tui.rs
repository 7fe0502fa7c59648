//! Text User Interface (TUI) utilities.
//!
//! Handles formatted output for the CLI.

use crate::config::BenchConfig;
use crate::registry::KernelKind;
use crate::utils::bench::{format_seconds, ResultRecord};
use terminal_size::{terminal_size, Width};

/// Get the current terminal width, constrained to a reasonable range
fn get_term_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        (w as usize).clamp(40, 200)
    } else {
        80
    }
}

/// Truncate string with ellipsis if it exceeds width (character-wise)
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut result: String = s.chars().take(width.saturating_sub(3)).collect();
        result.push_str("...");
        result
    }
}

/// Print the application header
pub fn print_header() {
    let term_width = get_term_width().min(80);
    let title = " SPMD Kernel Benchmarks ";
    let padding = term_width.saturating_sub(title.len() + 2) / 2;
    let right_padding = term_width.saturating_sub(padding + title.len());

    let border = "═".repeat(term_width);

    println!("╔{}╗", border);
    println!(
        "║{}{}{}║",
        " ".repeat(padding),
        title,
        " ".repeat(right_padding)
    );
    println!("╚{}╝", border);
    println!();
}

/// Print a box summarising the sweep about to run
pub fn print_config_box(config: &BenchConfig, seed: u64) {
    let term_width = get_term_width();
    let max_content_width = term_width.saturating_sub(4).max(40);

    let join = |items: Vec<String>| items.join(", ");
    let lines = [
        format!(
            "Kernels:   {}",
            join(config.kernels.iter().map(|k| k.to_string()).collect())
        ),
        format!("Sizes:     {}", join(config.sizes.iter().map(|s| s.to_string()).collect())),
        format!(
            "Processes: {}",
            join(config.processes.iter().map(|p| p.to_string()).collect())
        ),
        format!("Modes:     {}", config.modes.join(", ")),
        format!("Repeats:   {}   Seed: {}", config.repeats, seed),
    ];

    let content_width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(60)
        .min(max_content_width);
    let border = "─".repeat(content_width + 2);

    println!("┌{}┐", border);
    for line in &lines {
        println!(
            "│ {:<width$} │",
            truncate(line, content_width),
            width = content_width
        );
    }
    println!("└{}┘", border);
    println!();
}

/// Print one table per kernel, rows ordered as measured.
///
/// Speedup is relative to the first row with the same variant and size,
/// which is the smallest process count of the sweep.
pub fn print_results(records: &[ResultRecord]) {
    let mut kernels: Vec<&str> = Vec::new();
    for record in records {
        if !kernels.contains(&record.kernel.as_str()) {
            kernels.push(&record.kernel);
        }
    }
    for kernel in kernels {
        let rows: Vec<&ResultRecord> = records.iter().filter(|r| r.kernel == kernel).collect();
        print_kernel_table(kernel, &rows);
    }
}

fn print_kernel_table(kernel: &str, rows: &[&ResultRecord]) {
    let term_width = get_term_width();
    let fixed_width = 70;
    let variant_col_width = term_width.saturating_sub(fixed_width).max(10).min(20);
    let table_width = variant_col_width + 68;
    let unit = kernel
        .parse::<KernelKind>()
        .map(|k| k.size_unit())
        .unwrap_or("size");

    println!("  {} ({})", kernel, unit);
    println!("  {}", "─".repeat(table_width));
    println!(
        "  {:<v_width$} {:>6} {:>9} {:>12} {:>12} {:>8} {:>8} {:>14}",
        "Variant",
        "Procs",
        "Size",
        "Min",
        "Median",
        "CV",
        "Speedup",
        "Result",
        v_width = variant_col_width
    );
    println!("  {}", "─".repeat(table_width));

    for row in rows {
        let baseline = rows
            .iter()
            .find(|r| r.variant == row.variant && r.size == row.size)
            .map(|r| r.time_s)
            .unwrap_or(row.time_s);
        let speedup = if row.time_s > 0.0 { baseline / row.time_s } else { 1.0 };
        let result = row
            .result
            .map(|v| format!("{:.6e}", v))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<v_width$} {:>6} {:>9} {:>12} {:>12} {:>7.2}% {:>7.2}x {:>14}",
            truncate(&row.variant, variant_col_width),
            row.processes,
            row.size,
            format_seconds(row.time_s),
            format_seconds(row.median_s),
            row.cv * 100.0,
            speedup,
            result,
            v_width = variant_col_width
        );
    }
    println!();
}

/// Print the list of available kernels
pub fn print_available_kernels() {
    println!("Available kernels:");
    println!();
    for kind in KernelKind::ALL {
        println!(
            "  {:<22} [{}] - {}",
            kind.name(),
            kind.category(),
            kind.description()
        );
    }
}
