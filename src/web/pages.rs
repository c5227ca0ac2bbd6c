//! HTML pages and HTMX fragments

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::attendance::Attendance;
use crate::models::{Attendee, PlayDate, Player};
use crate::timefmt::{format_time, relative_time};

/// Field name -> message
pub type FormErrors = BTreeMap<&'static str, String>;

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="https://unpkg.com/htmx.org@1.9.12"></script>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #1a1a2e; color: #eee; margin: 0; }}
        main {{ max-width: 720px; margin: 0 auto; padding: 2rem 1rem; }}
        a {{ color: #8ea1ff; }}
        table {{ width: 100%; border-collapse: collapse; }}
        td, th {{ padding: 0.4rem; border-bottom: 1px solid #333; text-align: left; }}
        .error {{ color: #e74c3c; }}
        .server-error {{ background: #4a1c1c; padding: 0.75rem; border-radius: 8px; }}
        button, .discord-btn {{ background: #5865F2; color: white; border: 0; padding: 0.5rem 1rem; border-radius: 6px; cursor: pointer; text-decoration: none; }}
    </style>
</head>
<body>
    <main id="content">
{body}
    </main>
</body>
</html>"#,
        title = html_escape(title),
        body = body
    )
}

pub fn error_page(message: &str) -> String {
    layout(
        "PlayDate - Error",
        &format!(
            r#"<h1>Something went wrong</h1>
<p class="error">{}</p>
<p><a href="/">Back to PlayDate</a></p>"#,
            html_escape(message)
        ),
    )
}

fn field_error(errors: &FormErrors, field: &str) -> String {
    errors
        .get(field)
        .map(|msg| format!(r#"<div class="error">{}</div>"#, html_escape(msg)))
        .unwrap_or_default()
}

fn server_error(message: Option<&str>) -> String {
    message
        .map(|msg| format!(r#"<div class="server-error">{}</div>"#, html_escape(msg)))
        .unwrap_or_default()
}

pub fn register_form(
    name: &str,
    disc_id: &str,
    errors: &FormErrors,
    server_err: Option<&str>,
) -> String {
    format!(
        r##"<div id="register">
    <h1>Join PlayDate</h1>
    {server_err}
    <p><a class="discord-btn" href="/discord/login">Login with Discord</a></p>
    <p>or register with a verification code sent to your Discord DMs:</p>
    <form hx-post="/register" hx-target="#register" hx-swap="outerHTML">
        <label>Name <input name="name" value="{name}"></label>
        {name_err}
        <label>Discord ID <input name="discID" value="{disc_id}"></label>
        {disc_err}
        <button type="submit">Send code</button>
    </form>
    <p>Already registered? <a href="#" hx-get="/login" hx-target="#register" hx-swap="outerHTML">Log in</a></p>
    <p>Use <code>/idme</code> in Discord to find your ID.</p>
</div>"##,
        server_err = server_error(server_err),
        name = html_escape(name),
        name_err = field_error(errors, "name"),
        disc_id = html_escape(disc_id),
        disc_err = field_error(errors, "discID"),
    )
}

pub fn login_form(disc_id: &str, errors: &FormErrors, server_err: Option<&str>) -> String {
    format!(
        r##"<div id="register">
    <h1>Log in</h1>
    {server_err}
    <form hx-post="/login" hx-target="#register" hx-swap="outerHTML">
        <label>Discord ID <input name="discID" value="{disc_id}"></label>
        {disc_err}
        <button type="submit">Send code</button>
    </form>
    <p>New here? <a href="#" hx-get="/register" hx-target="#register" hx-swap="outerHTML">Register</a></p>
</div>"##,
        server_err = server_error(server_err),
        disc_id = html_escape(disc_id),
        disc_err = field_error(errors, "discID"),
    )
}

pub fn verify_form(disc_id: &str, errors: &FormErrors, server_err: Option<&str>) -> String {
    format!(
        r##"<div id="register">
    <h1>Check your Discord DMs</h1>
    {server_err}
    <form hx-post="/verify" hx-target="#register" hx-swap="outerHTML">
        <input type="hidden" name="discID" value="{disc_id}">
        <label>Verification code <input name="verificationCode" autocomplete="one-time-code"></label>
        {code_err}
        <button type="submit">Verify</button>
    </form>
</div>"##,
        server_err = server_error(server_err),
        disc_id = html_escape(disc_id),
        code_err = field_error(errors, "verificationCode"),
    )
}

fn playdate_rows(playdates: &[PlayDate], tz: Tz, now: DateTime<Utc>) -> String {
    if playdates.is_empty() {
        return r#"<tr><td colspan="2">Nothing here yet</td></tr>"#.to_string();
    }
    playdates
        .iter()
        .map(|pd| {
            format!(
                r##"<tr><td><a href="/playdate/{id}" hx-get="/playdate/{id}" hx-target="#content" hx-push-url="true">{game}</a></td><td>{when} ({relative})</td></tr>"##,
                id = pd.id,
                game = html_escape(&pd.game),
                when = format_time(pd.date, tz),
                relative = relative_time(pd.date, now),
            )
        })
        .collect()
}

pub fn home(
    player: &Player,
    upcoming: &[PlayDate],
    past: &[PlayDate],
    tz: Tz,
    now: DateTime<Utc>,
) -> String {
    format!(
        r##"<h1>Hey {name}!</h1>
<p>
    <button hx-get="/playdate" hx-target="#playdate-form" hx-swap="innerHTML">New playdate</button>
    <button hx-delete="/logout">Log out</button>
</p>
<div id="playdate-form"></div>
<h2>Upcoming</h2>
<table>{upcoming}</table>
<h2>Past</h2>
<table>{past}</table>"##,
        name = html_escape(&player.name),
        upcoming = playdate_rows(upcoming, tz, now),
        past = playdate_rows(past, tz, now),
    )
}

pub fn playdate_form(
    game: &str,
    date: &str,
    errors: &FormErrors,
    server_err: Option<&str>,
) -> String {
    format!(
        r##"<form id="new-playdate" hx-post="/playdate" hx-swap="outerHTML">
    {server_err}
    <label>Game <input name="game" value="{game}"></label>
    {game_err}
    <label>When <input type="datetime-local" name="date" value="{date}"></label>
    {date_err}
    <button type="submit">Create</button>
</form>"##,
        server_err = server_error(server_err),
        game = html_escape(game),
        game_err = field_error(errors, "game"),
        date = html_escape(date),
        date_err = field_error(errors, "date"),
    )
}

pub fn attendees_table(playdate: &PlayDate, attendees: &[Attendee], server_err: Option<&str>) -> String {
    let rows: String = attendees
        .iter()
        .map(|a| {
            format!(
                "<tr><td>{}</td><td>{} {}</td></tr>",
                html_escape(&a.player.name),
                a.attending.glyph(),
                a.attending
            )
        })
        .collect();

    let buttons = if playdate.is_pending() {
        [Attendance::Yes, Attendance::Maybe, Attendance::No]
            .iter()
            .map(|vote| {
                format!(
                    r##"<button hx-post="/playdate/{id}/{action}" hx-target="#players" hx-swap="outerHTML">{glyph} {action}</button> "##,
                    id = playdate.id,
                    action = vote.as_str(),
                    glyph = vote.glyph(),
                )
            })
            .collect::<String>()
    } else {
        String::new()
    };

    format!(
        r#"<div id="players">
    {server_err}
    <p>{buttons}</p>
    <table>
        <tr><th>Player</th><th>Attending</th></tr>
        {rows}
    </table>
</div>"#,
        server_err = server_error(server_err),
        buttons = buttons,
        rows = rows,
    )
}

pub fn playdate_detail(
    playdate: &PlayDate,
    owner: Option<&Player>,
    attendees: &[Attendee],
    tz: Tz,
    now: DateTime<Utc>,
) -> String {
    let owner_name = owner.map(|o| o.name.as_str()).unwrap_or("unknown");
    format!(
        r#"<p><a href="/">&larr; All playdates</a></p>
<h1>{game}</h1>
<p>{when} ({relative}) hosted by {owner}. Status: {status}</p>
{table}"#,
        game = html_escape(&playdate.game),
        when = format_time(playdate.date, tz),
        relative = relative_time(playdate.date, now),
        owner = html_escape(owner_name),
        status = playdate.status.as_str(),
        table = attendees_table(playdate, attendees, None),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayDateStatus;

    fn playdate(status: PlayDateStatus) -> PlayDate {
        PlayDate {
            id: 3,
            created_date: Utc::now(),
            game: "<script>alert(1)</script>".to_string(),
            date: Utc::now(),
            status,
            owner_id: 1,
            message_id: None,
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_user_text_is_escaped() {
        let page = playdate_detail(&playdate(PlayDateStatus::Pending), None, &[], chrono_tz::UTC, Utc::now());
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_vote_buttons_only_while_pending() {
        let open = attendees_table(&playdate(PlayDateStatus::Pending), &[], None);
        assert!(open.contains(r#"hx-post="/playdate/3/yes""#));
        assert!(open.contains(r#"hx-post="/playdate/3/maybe""#));

        let closed = attendees_table(&playdate(PlayDateStatus::Done), &[], None);
        assert!(!closed.contains("hx-post"));
    }

    #[test]
    fn test_field_errors_render() {
        let mut errors = FormErrors::new();
        errors.insert("name", "name is required".to_string());
        let form = register_form("", "123", &errors, Some("server is down"));
        assert!(form.contains("name is required"));
        assert!(form.contains("server is down"));
        assert!(form.contains(r#"value="123""#));
    }
}
