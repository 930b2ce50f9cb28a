//! HTML rendering for listing and error pages.
//!
//! A [`RenderContext`] is built once at startup, optionally from a custom
//! template directory, and is never modified afterwards. Every route shares
//! the same context through an `Arc`.
//!
//! A custom template directory may contain:
//!
//! ```text
//! <dir>/base.html           listing page shell
//! <dir>/errors/<status>.html  served verbatim for that status
//! ```
//!
//! The shell is plain HTML in which `{{title}}`, `{{listing}}`, `{{zip_url}}`
//! and `{{tar_gz_url}}` are replaced. Substituted values are already escaped.

use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, warn};

use crate::listing::ListingPage;

/// Statuses for which a custom error page is looked up.
pub const ERROR_STATUSES: [u16; 5] = [400, 401, 403, 404, 500];

const DEFAULT_SHELL: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{{title}}</title>
    <style>
        body { font-family: sans-serif; width: 90%; padding-left: 5%; padding-top: 10px; }
        td { padding: .5em; }
        a { display: block; }
        tbody tr:nth-child(odd) { background: #eee; }
        .number { text-align: right; }
        .text { text-align: left; word-break: break-all; }
        table { width: 100%; max-width: 100%; }
        .exports a { display: inline; margin-right: 1em; }
    </style>
</head>
<body>
<h1>{{title}}</h1>
<div class="exports">
    <a href="{{tar_gz_url}}">.tar.gz of all files</a>
    <a href="{{zip_url}}">.zip of all files</a>
</div>
{{listing}}
</body>
</html>
"##;

const SCRIPT: &str = r##"<script type="text/javascript">
function send(url, options) {
    fetch(url, options).then((response) => {
        if (!response.ok) {
            alert("HTTP error " + response.status + ": " + response.statusText);
        } else {
            window.location.reload();
        }
    }).catch((err) => alert(err));
}
function createFolder() {
    const name = document.getElementById("newfolder").value;
    if (name.length === 0) return;
    send(window.location.pathname + "?new", {
        method: "POST",
        headers: { "Content-Type": "application/x-www-form-urlencoded" },
        body: "name=" + encodeURIComponent(name),
    });
}
function removeFile(url) {
    if (confirm("Delete " + decodeURIComponent(url) + "?")) {
        send(url, { method: "DELETE" });
    }
}
</script>
"##;

// =============================================================================
// Render Context
// =============================================================================

/// Immutable rendering configuration shared by all routes.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Custom error pages keyed by status code
    error_pages: HashMap<u16, String>,

    /// Custom listing page shell
    shell: Option<String>,
}

impl RenderContext {
    /// Built-in pages only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Load custom pages from `dir`, falling back to the built-in ones.
    ///
    /// A directory that does not exist disables custom templates with a
    /// warning rather than failing startup.
    pub fn from_template_dir(dir: Option<&Path>) -> Self {
        let dir = match dir {
            Some(dir) => dir,
            None => return Self::builtin(),
        };
        if !dir.is_dir() {
            warn!(
                path = %dir.display(),
                "Template directory does not exist, using built-in templates"
            );
            return Self::builtin();
        }

        let mut context = Self::builtin();
        for status in ERROR_STATUSES {
            let path = dir.join("errors").join(format!("{}.html", status));
            if let Ok(body) = fs::read_to_string(&path) {
                debug!(path = %path.display(), "Loaded custom error page");
                context.error_pages.insert(status, body);
            }
        }

        let shell_path = dir.join("base.html");
        match fs::read_to_string(&shell_path) {
            Ok(shell) => {
                debug!(path = %shell_path.display(), "Loaded custom listing template");
                context.shell = Some(shell);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %shell_path.display(), "Cannot read listing template: {}", e),
        }
        context
    }

    /// Add or replace the page served for `status`.
    pub fn with_error_page(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.error_pages.insert(status.as_u16(), body.into());
        self
    }

    /// Use `shell` as the listing page template.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Body of the error page for `status`.
    pub fn error_body(&self, status: StatusCode) -> String {
        if let Some(custom) = self.error_pages.get(&status.as_u16()) {
            return custom.clone();
        }
        let reason = status.canonical_reason().unwrap_or("Error");
        format!(
            "<!DOCTYPE html>\n<html><head><title>{code} {reason}</title></head>\
             <body><h1>{code} {reason}</h1></body></html>\n",
            code = status.as_u16(),
            reason = reason
        )
    }

    /// Full error response for `status`.
    pub fn error_page(&self, status: StatusCode) -> Response {
        (status, Html(self.error_body(status))).into_response()
    }

    /// HTML of a directory listing page.
    pub fn listing_html(&self, page: &ListingPage) -> String {
        let shell = self.shell.as_deref().unwrap_or(DEFAULT_SHELL);
        let title = html_escape(&page.title);
        let listing = listing_fragment(page);
        let zip_url = html_escape(&page.zip_url);
        let tar_gz_url = html_escape(&page.tar_gz_url);

        fill_placeholders(
            shell,
            &[
                ("title", &title),
                ("listing", &listing),
                ("zip_url", &zip_url),
                ("tar_gz_url", &tar_gz_url),
            ],
        )
    }

    /// Full listing response.
    pub fn listing_page(&self, page: &ListingPage) -> Response {
        (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-cache")],
            Html(self.listing_html(page)),
        )
            .into_response()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Replace `{{key}}` tokens in a single pass.
///
/// Substituted text is never scanned again, so a value containing a token is
/// emitted literally. Unknown tokens are left as they are.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let replaced = after.find("}}").and_then(|end| {
            let key = after[..end].trim();
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end + 2))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Table of entries plus the controls the route's capabilities allow.
fn listing_fragment(page: &ListingPage) -> String {
    let caps = page.capabilities;
    let mut html = String::new();

    if caps.creates {
        html.push_str(
            "<div>\n<input type=\"text\" placeholder=\"Name new folder\" id=\"newfolder\">\n\
             <button type=\"button\" onclick=\"createFolder()\">Create</button>\n</div>\n",
        );
    }
    html.push_str("<hr>\n<table>\n<thead><tr><th>Name</th><th>Modified</th><th>Type</th>");
    html.push_str("<th class=\"number\">Size (bytes)</th>");
    if caps.deletes {
        html.push_str("<th></th>");
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    html.push_str("<tr><td colspan=\"4\"><a href=\"../\">..</a></td></tr>\n");

    for entry in &page.entries {
        let url = html_escape(&entry.url);
        let _ = write!(
            html,
            "<tr><td class=\"text\"><a href=\"{}\">{}</a></td><td>{}</td>",
            url,
            html_escape(&entry.name),
            entry.modified_label()
        );
        if entry.is_dir {
            let _ = write!(
                html,
                "<td>{} [files in: {}]</td><td class=\"number\">---</td>",
                entry.kind, entry.child_count
            );
        } else {
            let _ = write!(
                html,
                "<td>{}</td><td class=\"number\">{} ({})</td>",
                html_escape(&entry.kind),
                entry.size_label(),
                entry.size
            );
        }
        if caps.deletes {
            if entry.is_dir {
                html.push_str("<td></td>");
            } else {
                let _ = write!(
                    html,
                    "<td><button type=\"button\" data-url=\"{}\" \
                     onclick=\"removeFile(this.dataset.url)\">Delete</button></td>",
                    url
                );
            }
        }
        html.push_str("</tr>\n");
    }

    if caps.uploads {
        html.push_str(
            "<tr><td colspan=\"4\"><form method=\"post\" enctype=\"multipart/form-data\">\
             <input required name=\"file\" type=\"file\" multiple>\
             <input value=\"Upload\" type=\"submit\"></form></td></tr>\n",
        );
    }
    html.push_str("</tbody>\n</table>\n");

    if caps.creates || caps.deletes {
        html.push_str(SCRIPT);
    }
    html
}
