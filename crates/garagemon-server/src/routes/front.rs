use crate::error::AppError;
use crate::identity::CallerProfile;
use crate::state::AppState;
use anyhow::Context;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Html;
use chrono::Utc;
use garagemon_core::uptime::rough_duration;
use std::fmt::Write as _;
use std::net::SocketAddr;

/// GET /: the status page with the big button.
pub async fn front_page(
    State(app): State<AppState>,
    request: Request,
) -> Result<Html<String>, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let caller = match peer {
        Some(addr) => app
            .identity
            .whois(addr)
            .await
            .context("looking up caller")?,
        None => None,
    };

    let summary = serde_yaml::to_string(&*app.config).context("rendering config summary")?;
    let uptime = rough_duration(Utc::now() - app.started_at);

    Ok(Html(render(&PageData {
        mode: app.actuator.mode().as_str(),
        uptime: &uptime,
        started: &app.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        summary: &summary,
        caller: caller.as_ref(),
        peer,
    })))
}

struct PageData<'a> {
    mode: &'a str,
    uptime: &'a str,
    started: &'a str,
    summary: &'a str,
    caller: Option<&'a CallerProfile>,
    peer: Option<SocketAddr>,
}

const SCRIPT: &str = r#"
const button = document.getElementById("activate");
const result = document.getElementById("result");
button.addEventListener("click", async () => {
  button.disabled = true;
  result.className = "";
  result.textContent = "Activating...";
  try {
    const resp = await fetch("/activate", { method: "POST" });
    const body = await resp.json();
    if (body.error) {
      result.className = "error";
      result.textContent = body.error;
    } else {
      result.textContent = "Done.";
    }
  } catch (err) {
    result.className = "error";
    result.textContent = String(err);
  } finally {
    button.disabled = false;
  }
});
"#;

fn render(page: &PageData<'_>) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>garagemon</title>\n\
         <link rel=\"stylesheet\" href=\"/static/style.css\">\n\
         <link rel=\"icon\" href=\"/static/garage.svg\" type=\"image/svg+xml\">\n\
         </head>\n<body>\n<h1>garagemon</h1>\n",
    );

    match (page.caller, page.peer) {
        (Some(who), _) => {
            let _ = writeln!(
                html,
                "<p class=\"meta\">Hello, {} ({})</p>",
                escape(&who.display_name),
                escape(&who.login_name)
            );
        }
        (None, Some(addr)) => {
            let _ = writeln!(html, "<p class=\"meta\">Connected from {}</p>", escape(&addr.to_string()));
        }
        (None, None) => {}
    }

    html.push_str(
        "<button id=\"activate\" type=\"button\">Open / Close</button>\n\
         <p id=\"result\"></p>\n",
    );

    let _ = writeln!(
        html,
        "<p class=\"meta\">Mode: {}<br>Up {} (since {})</p>",
        escape(page.mode),
        escape(page.uptime),
        escape(page.started)
    );
    let _ = writeln!(html, "<pre>{}</pre>", escape(page.summary));
    let _ = write!(html, "<script>{SCRIPT}</script>\n</body>\n</html>\n");
    html
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
