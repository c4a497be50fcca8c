use anyhow::{anyhow, Context, Result};

use super::args::{HistoryCliArgs, ShowCliArgs};
use crate::config::Config;
use crate::db::{self, SessionRepository, StoredSession};

const PREVIEW_CHARS: usize = 100;

pub fn handle_history_command(config: &Config, args: HistoryCliArgs) -> Result<()> {
    let conn = db::open_db(&config.storage.resolve_db_path()?)?;

    let sessions = SessionRepository::list(&conn, Some(args.limit), args.subject.as_deref())?;

    if sessions.is_empty() {
        println!("No sessions found matching your criteria.");
        return Ok(());
    }

    println!("Found {} session(s):\n", sessions.len());

    for session in &sessions {
        print!("{}", format_entry(session));
        println!("---");
    }

    println!("\nTo see a full session, use: cognspective show <ID>");

    Ok(())
}

pub fn handle_show_command(config: &Config, args: ShowCliArgs) -> Result<()> {
    let conn = db::open_db(&config.storage.resolve_db_path()?)?;

    let session = SessionRepository::get(&conn, args.id)?
        .ok_or_else(|| anyhow!("Session with ID {} not found", args.id))?;

    let json = serde_json::to_string_pretty(&session).context("Failed to encode session")?;
    println!("{}", json);

    Ok(())
}

fn format_entry(session: &StoredSession) -> String {
    let mut out = String::new();
    out.push_str(&format!("ID: {}\n", session.id));
    out.push_str(&format!("Date: {}\n", session.start_time));
    out.push_str(&format!("Subject: {}\n", session.subject));
    if !session.name.is_empty() {
        out.push_str(&format!("Name: {}\n", session.name));
    }
    out.push_str(&format!("Duration: {}s\n", session.duration_seconds));
    out.push_str(&format!("Score: {}\n", session.llm_score));
    out.push_str(&format!("Transcript: {}\n", preview(&session.transcription_text)));
    out
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMetrics;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);

        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_format_entry() {
        let session = StoredSession {
            id: 3,
            session_uid: "uid".to_string(),
            name: String::new(),
            education: String::new(),
            subject: "Physics".to_string(),
            start_time: "2026-01-05T10:00:00+00:00".to_string(),
            end_time: "2026-01-05T10:20:00+00:00".to_string(),
            duration_seconds: 1200,
            metrics: SessionMetrics::default(),
            transcription_text: "Forces and motion".to_string(),
            llm_score: "N/A".to_string(),
            llm_strengths: String::new(),
            llm_improvements: String::new(),
            llm_feedback: String::new(),
            created_at: "2026-01-05 10:20:00".to_string(),
        };

        let entry = format_entry(&session);
        assert!(entry.contains("ID: 3\n"));
        assert!(entry.contains("Subject: Physics\n"));
        assert!(!entry.contains("Name:"));
        assert!(entry.contains("Score: N/A\n"));
    }
}
