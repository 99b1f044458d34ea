use colored::Colorize;

use crate::run::RunSummary;

pub fn print_summary(summary: &RunSummary) {
    println!("{}", "=== Average Session Duration ===".bright_blue().bold());

    if summary.averages.is_empty() {
        println!("{}", "No completed sessions.".dimmed());
    } else {
        println!(
            "{:<24} {:<9} {}",
            "USER".dimmed(),
            "SESSIONS".dimmed(),
            "AVERAGE".dimmed(),
        );
        for avg in &summary.averages {
            println!(
                "{:<24} {:<9} {}",
                avg.user_id,
                avg.sessions,
                format_duration(avg.mean_duration_secs)
            );
        }
    }

    println!();
    println!("{}  {}", "Files:".dimmed(), summary.files);
    println!("{}  {}", "Sessions:".dimmed(), summary.sessions);
    if let Some(count) = summary.stray_count {
        let count_text = count.to_string();
        let colored_count = if count == 0 {
            count_text.bright_green()
        } else {
            count_text.bright_yellow()
        };
        println!("{}  {}", "Strays:".dimmed(), colored_count);
    }
    println!("{}  {}", "Pending:".dimmed(), summary.pending.len());

    if let Some(ref strays) = summary.strays {
        if !strays.is_empty() {
            println!();
            println!("{}", "Stray Events:".dimmed());
            for s in strays {
                println!(
                    "  {:<20} {:<12} {:<6} {}",
                    s.user_id,
                    s.timestamp,
                    s.action,
                    s.reason.to_string().dimmed()
                );
            }
        }
    }
}

fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = (secs % 60.0) as u64;
        format!("{}m {}s", mins, remaining_secs)
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let mins = ((secs % 3600.0) / 60.0) as u64;
        format!("{}h {}m", hours, mins)
    }
}
