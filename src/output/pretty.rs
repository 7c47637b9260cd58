//! Colored terminal output formatting.

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::offline::{ItemKind, Outcome, QueueItem, QueueStats, SyncReport, TrackerState};

const ERROR_WIDTH: usize = 60;

/// Format a list of queue items as a pretty table
pub fn format_items_pretty(items: &[QueueItem], title: &str) -> String {
    if items.is_empty() {
        return format!("{title} (0 items)\n  Nothing queued");
    }

    let mut output = format!("{} ({} items)\n", title, items.len());
    output.push_str(&"─".repeat(72));
    output.push('\n');

    for item in items {
        let marker = if item.dead_lettered {
            "[!]".red()
        } else if item.attempts > 0 {
            "[~]".yellow()
        } else {
            "[ ]".white()
        };

        let kind = match item.kind {
            ItemKind::Mutation => item.kind.as_str().blue(),
            ItemKind::Upload => item.kind.as_str().magenta(),
        };

        let mut line = format!(
            "{} {:<8} {}  {}",
            marker,
            kind,
            item.table.bold(),
            item.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );

        if let Some(row_id) = item.row_id() {
            line.push_str(&format!("  {}", row_id.cyan()));
        }
        if item.attempts > 0 {
            line.push_str(&format!("  {}", format!("{} attempts", item.attempts).yellow()));
        }

        output.push_str(&line);
        output.push('\n');
        output.push_str(&format!("    {}\n", item.id.dimmed()));

        if let Some(error) = &item.last_error {
            output.push_str(&format!("    {}\n", shorten(error, ERROR_WIDTH).red()));
        }
    }

    output
}

/// Format a freshly queued item
pub fn format_queued_pretty(item: &QueueItem) -> String {
    let mut output = format!(
        "{} {} {}\n",
        "Queued".green(),
        item.kind,
        item.table.bold()
    );
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), item.id));
    if let Some(row_id) = item.row_id() {
        output.push_str(&format!("  {}: {}\n", "Row".dimmed(), row_id));
    }
    if let Ok(upload) = item.upload_payload() {
        output.push_str(&format!("  {}: {}\n", "Path".dimmed(), upload.path));
    }
    output
}

/// Format connectivity and queue state
pub fn format_status_pretty(state: &TrackerState, stats: &QueueStats) -> String {
    let mut lines = Vec::new();

    lines.push("Offline Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    let online = if state.is_online {
        "online".green()
    } else {
        "offline".yellow()
    };
    lines.push(format!("  Backend:    {online}"));

    lines.push(format!(
        "  Pending:    {} {}",
        state.pending_count,
        if state.pending_count > 0 {
            "items waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    if stats.uploads > 0 {
        lines.push(format!("  Uploads:    {}", stats.uploads));
    }

    lines.push(format!(
        "  Stuck:      {} {}",
        stats.dead_lettered,
        if stats.dead_lettered > 0 {
            "items need attention".red()
        } else {
            "".normal()
        }
    ));

    if let Some(oldest) = stats.oldest_pending {
        lines.push(format!("  Oldest:     {}", age(oldest).dimmed()));
    }

    if stats.dead_lettered > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'glas-offline retry --all' to retry stuck items"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format the outcome of a sync command
pub fn format_sync_pretty(report: Option<&SyncReport>, state: &TrackerState) -> String {
    let Some(report) = report else {
        return format!(
            "{} nothing sent, {} items pending",
            "Backend unreachable:".yellow(),
            state.pending_count
        );
    };

    if report.results.is_empty() {
        return "No pending items to sync.".to_string();
    }

    let mut lines = Vec::new();
    lines.push("Sync Results".bold().to_string());
    lines.push("─".repeat(40));

    for result in &report.results {
        let icon = match result.outcome {
            Outcome::Synced => "✓".green(),
            Outcome::Failed => "✗".red(),
            Outcome::DeadLettered => "!".red().bold(),
            Outcome::Skipped => "○".yellow(),
        };
        let mut line = format!("{} {} {} {}", icon, result.kind, result.table, result.id.dimmed());
        if let Some(error) = &result.error {
            line.push_str(&format!("\n    {}", shorten(error, ERROR_WIDTH).red()));
        }
        lines.push(line);
    }

    lines.push(String::new());
    let mut summary = format!("{} synced", report.synced.to_string().green());
    if report.failed > 0 {
        summary.push_str(&format!(", {} failed", report.failed.to_string().red()));
    }
    if report.dead_lettered > 0 {
        summary.push_str(&format!(
            ", {} dead-lettered",
            report.dead_lettered.to_string().red()
        ));
    }
    if report.skipped > 0 {
        summary.push_str(&format!(", {} skipped", report.skipped.to_string().yellow()));
    }
    summary.push_str(&format!(", {} pending", state.pending_count));
    lines.push(summary);

    lines.join("\n")
}

fn age(t: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(t);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn shorten(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width - 3).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}
