use std::time::Duration;

use blog2pod_core::{Blog2PodConfig, PodcastFile};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "blog2pod".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Turn blog articles into narrated podcasts\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print elapsed time, colored by how long a podcast run usually takes
pub fn print_timing(label: &str, duration: Duration) {
    let secs = duration.as_secs_f64();
    let label = format!("{}:", label);
    if secs < 30.0 {
        eprintln!("  {} {:>8.1}s ({})", label.dimmed(), secs, "fast".dimmed());
    } else if secs < 120.0 {
        eprintln!("  {} {:>8.1}s ({})", label.dimmed(), secs, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.1}s ({})", label.dimmed(), secs, "slow".bright_red());
    }
}

/// Print the effective settings, without secrets
pub fn print_config(config: &Blog2PodConfig) {
    let yes_no = |on: bool| if on { "yes" } else { "no" };
    eprintln!(
        "  {} {}",
        "Render:".dimmed(),
        config
            .fetch
            .browser
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "off".to_string())
            .bright_white()
    );
    eprintln!("  {} {}", "Cleaning:".dimmed(), yes_no(config.chat.is_some()).bright_white());
    eprintln!(
        "  {} {}",
        "Pagination:".dimmed(),
        yes_no(config.pipeline.follow_pagination).bright_white()
    );
    eprintln!(
        "  {} {} / {} ({} chars per request)",
        "Voice:".dimmed(),
        config.speech.model.bright_white(),
        config.speech.voice.bright_white(),
        config.speech.chunk_size
    );
    eprintln!(
        "  {} {}\n",
        "Output:".dimmed(),
        config.pipeline.completed_dir.display().bright_white()
    );
}

/// Print podcast details summary
pub fn print_podcast_details(podcast: &PodcastFile) {
    let size = std::fs::metadata(&podcast.path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());

    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Podcast".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    eprintln!("  {} {}", "Title:".dimmed(), podcast.title.bright_white());
    eprintln!("  {} {}", "File:".dimmed(), podcast.path.display().bright_white());
    eprintln!("  {} {}", "Size:".dimmed(), size.bright_white());
    eprintln!(
        "  {} {}",
        "Artwork:".dimmed(),
        if podcast.has_artwork { "yes" } else { "no" }.bright_white()
    );
    eprintln!("  {} {}\n", "Source:".dimmed(), podcast.comment.bright_white());
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }
}
