//! Terminal output helpers for the command-line interface.
//!
//! Colored status lines, paper listings and indicatif progress bars.
//! Nothing in here affects search or download semantics.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::models::{BatchEntry, BatchReport, Paper, SourceId};

/// Width used for wrapped and truncated fields
const LINE_WIDTH: usize = 100;

/// Longest abstract excerpt shown per paper
const ABSTRACT_PREVIEW: usize = 300;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Icon shown next to papers from each source.
pub fn source_icon(source: SourceId) -> &'static str {
    match source {
        SourceId::Arxiv => "📝",
        SourceId::OpenReview => "📖",
        SourceId::GoogleScholar => "🔎",
    }
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Skipped => "○",
        Status::Download => "↓",
        Status::Search => "🔍",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Skipped,
    Download,
    Search,
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => println!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Skipped => println!("{} {}", icon.white().dimmed(), msg),
        Status::Download => println!("{} {}", icon.magenta(), msg),
        Status::Search => println!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "─".repeat(80).dimmed());
}

/// Print search results header.
pub fn print_search_header(query: &str, count: usize, duration: Duration) {
    println!();
    println!(
        "{} Search results for: \"{}\"",
        status_icon(Status::Search).yellow().bold(),
        query.cyan().bold()
    );
    println!(
        "{} Found {} papers in {:.2}s",
        "─".repeat(30).dimmed(),
        count.to_string().green().bold(),
        duration.as_secs_f64()
    );
    println!();
}

/// Print one paper of a result list.
///
/// `translation` holds the translated title and abstract when available.
pub fn print_paper(index: usize, paper: &Paper, translation: Option<(&str, &str)>) {
    println!(
        "{} {} {}",
        format!("[{}]", index + 1).dimmed(),
        source_icon(paper.source),
        paper.title.blue().bold()
    );
    if let Some((title, _)) = translation.filter(|(t, _)| !t.is_empty()) {
        println!("    {}", title.cyan());
    }

    if !paper.authors.is_empty() {
        println!(
            "    Authors: {}",
            truncate_with_ellipsis(&paper.author_line(), LINE_WIDTH)
        );
    }
    println!(
        "    Source:  {}{}",
        paper.source.to_string().green(),
        paper
            .published
            .as_deref()
            .map(|p| format!(" ({})", p.yellow()))
            .unwrap_or_default()
    );
    if !paper.url.is_empty() {
        println!("    URL:     {}", paper.url.dimmed());
    }
    match paper.pdf_url.as_deref().filter(|_| paper.has_pdf()) {
        Some(pdf) => println!("    PDF:     {}", pdf.dimmed()),
        None => println!("    PDF:     {}", "none".dimmed()),
    }

    let abstract_text = collapse_whitespace(&paper.r#abstract);
    if !abstract_text.is_empty() {
        println!(
            "    {}",
            truncate_with_ellipsis(&abstract_text, ABSTRACT_PREVIEW)
        );
    }
    if let Some((_, translated)) = translation.filter(|(_, a)| !a.is_empty()) {
        println!(
            "    {}",
            truncate_with_ellipsis(&collapse_whitespace(translated), ABSTRACT_PREVIEW).cyan()
        );
    }
    println!();
}

fn print_entries(label: &str, status: Status, entries: &[BatchEntry]) {
    if entries.is_empty() {
        return;
    }
    println!("{} ({}):", label.bold(), entries.len());
    for entry in entries {
        print_status(
            status,
            &format!(
                "{} - {}",
                truncate_with_ellipsis(&entry.title, 60),
                entry.message
            ),
        );
    }
}

/// Print the three buckets of a batch download.
pub fn print_batch_report(report: &BatchReport) {
    print_section("Download summary");
    print_entries("Downloaded", Status::Success, &report.success);
    print_entries("Skipped", Status::Skipped, &report.skipped);
    print_entries("Failed", Status::Error, &report.failed);
    print_divider();
    println!(
        "{} downloaded, {} skipped, {} failed, {} total",
        report.success.len().to_string().green().bold(),
        report.skipped.len().to_string().yellow(),
        report.failed.len().to_string().red(),
        report.total
    );
}

/// Collapse whitespace runs (including newlines) to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate text to fit within the specified width using unicode-aware truncation.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }

    let char_widths: Vec<(char, usize)> = text
        .chars()
        .map(|c| (c, unicode_width::UnicodeWidthChar::width(c).unwrap_or(1)))
        .collect();

    let total_width: usize = char_widths.iter().map(|(_, w)| *w).sum();
    if total_width <= max_width {
        return text.to_string();
    }

    // Longest prefix that fits with room for the ellipsis
    let mut current_width = 0;
    let mut end_idx = 0;
    for (i, (_, w)) in char_widths.iter().enumerate() {
        if current_width + w > max_width - 3 {
            break;
        }
        current_width += w;
        end_idx = i + 1;
    }

    if end_idx == 0 {
        return "...".to_string();
    }

    let truncated: String = char_widths[..end_idx].iter().map(|(c, _)| *c).collect();
    format!("{}...", truncated)
}

fn style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
}

/// A spinner for operations without measurable progress.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(style("{spinner:.cyan} {msg}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    /// Finish with success message.
    pub fn finish_with_success(&self, msg: &str) {
        self.pb
            .set_style(style("{spinner:.green} {msg}").tick_chars("✓✓"));
        self.pb.finish_with_message(msg.to_string());
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(style("{spinner:.red} {msg}").tick_chars("✗✗"));
        self.pb.finish_with_message(msg.to_string());
    }
}

/// Progress bar for a batch of downloads.
///
/// The bar counts papers; the message carries the current file's percentage.
pub struct DownloadProgress {
    pb: indicatif::ProgressBar,
}

impl DownloadProgress {
    pub fn new(total: usize) -> Self {
        let pb = indicatif::ProgressBar::new(total as u64);
        pb.set_style(
            style("{prefix:.bold} {bar:40.cyan/blue} {pos}/{len} {msg}").progress_chars("█▓▒░ "),
        );
        pb.set_prefix("Downloading");

        Self { pb }
    }

    /// Called before paper `index` of `total` starts.
    pub fn start_item(&self, index: usize, _total: usize) {
        self.pb.set_position(index as u64);
        self.pb.set_message(String::new());
    }

    /// Byte progress of the current paper, in percent.
    pub fn item_percent(&self, percent: f64) {
        self.pb.set_message(format!("{:.0}%", percent));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
