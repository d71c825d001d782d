//! Text of the messages the welcome pipeline sends.

use std::fmt::Write as _;

use crate::telegram::LinkButton;

use super::member::MemberInfo;

const NO_USERNAME: &str = "No Username";
const DIVIDER: &str = "▰▰▰▰▰▰▰▰▰▰▰▰▰";

/// Welcome caption for a new member.
#[must_use]
pub fn welcome_caption(chat_title: &str, member: &MemberInfo, member_count: Option<i32>) -> String {
    let username = member.username.as_deref().unwrap_or(NO_USERNAME);
    let count = member_count.map_or_else(|| "?".to_owned(), |c| c.to_string());

    let mut caption = String::new();
    let _ = writeln!(caption, "❅────✦ Welcome to ✦────❅");
    let _ = writeln!(caption, "{chat_title}");
    let _ = writeln!(caption, "{DIVIDER}");
    let _ = writeln!(caption, "➻ Name ✧ {}", member.first_name);
    let _ = writeln!(caption, "➻ Id ✧ {}", member.id);
    let _ = writeln!(caption, "➻ Username ✧ @{username}");
    let _ = writeln!(caption, "➻ Total Members ✧ {count}");
    let _ = write!(caption, "{DIVIDER}");
    caption
}

/// Short greeting used when the full caption could not be sent.
#[must_use]
pub fn fallback_greeting(member: &MemberInfo) -> String {
    format!("🎉 Welcome, {}!", member.first_name)
}

/// Announcement sent when a burst starts a cooldown.
#[must_use]
pub fn burst_notice(burst: u32, minutes: u32) -> String {
    format!("Massive join detected (x{burst}). Welcome messages disabled for {minutes} minutes.")
}

/// Announcement sent once when a cooldown lapses.
pub const REENABLED_NOTICE: &str = "Welcome messages re-enabled.";

/// Inline buttons attached to a welcome caption.
#[must_use]
pub fn welcome_buttons(member: &MemberInfo, bot_username: Option<&str>) -> Vec<LinkButton> {
    let mut buttons = vec![LinkButton::new(
        "๏ View new member ๏",
        format!("tg://openmessage?user_id={}", member.id),
    )];
    if let Some(bot) = bot_username {
        buttons.push(LinkButton::new(
            "๏ Add me to your group ๏",
            format!("https://t.me/{bot}?startgroup=true"),
        ));
    }
    buttons
}
