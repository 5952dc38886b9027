//! Show a user's notification inbox

use crate::session::Session;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(session: &Session, user: &str, clear: bool) -> Result<()> {
    let inbox = session.db.notifications();
    let notes = if clear {
        inbox.drain_user(user)?
    } else {
        inbox.for_user(user)?
    };

    if session.json {
        return util::print_json(&notes);
    }

    if notes.is_empty() {
        println!("{}", format!("No notifications for {}", user).dimmed());
        return Ok(());
    }

    println!("{} {}", format!("Notifications for {}", user).bold(), format!("({})", notes.len()).dimmed());
    for note in &notes {
        let details: Vec<String> = note
            .payload
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "  {:<22} {} {}",
            note.kind.as_str().cyan(),
            details.join(" "),
            util::format_relative_time(note.created_at_ms).dimmed()
        );
    }
    if clear {
        println!("{}", "Inbox cleared".dimmed());
    }
    Ok(())
}
