// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-rendered HTML. Deliberately plain; every dynamic value goes
//! through [`escape`] or a URL encoder.

use url::form_urlencoded;

/// One row of a folder or file listing.
#[derive(Debug, Clone, Default)]
pub struct ListItem {
    pub url: String,
    pub label: String,
    pub delete_url: Option<String>,
    pub delete_message: &'static str,
    /// Owner controls for the folder's PIN.
    pub pin_folder: Option<String>,
    pub has_pin: bool,
}

/// Prompt variants on the PIN entry page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinPrompt {
    Enter,
    Error(String),
    /// Final attempt: the form carries the confirmation checkbox.
    ConfirmFinal(String),
}

/// Escape text for HTML body and attribute context.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode one path segment.
pub fn encode_segment(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `/uploads/{folder}`.
pub fn folder_url(folder: &str) -> String {
    format!("/uploads/{}", encode_segment(folder))
}

/// `/uploads/{folder}/{file}`.
pub fn file_url(folder: &str, file: &str) -> String {
    format!("{}/{}", folder_url(folder), encode_segment(file))
}

/// `/uploads/{folder}/pin?next=…`.
pub fn pin_entry_url(folder: &str, next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{}/pin?{query}", folder_url(folder))
}

/// Accept only same-site relative paths as redirect targets.
pub fn safe_next(next: Option<&str>, fallback: &str) -> String {
    match next.map(str::trim) {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => {
            n.to_string()
        }
        _ => fallback.to_string(),
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title></head><body>\
         <nav class=\"site-nav\"><a href=\"/\">Home</a> <a href=\"/uploads\">Uploads</a></nav>\
         <main>{body}</main></body></html>",
        escape(title)
    )
}

pub fn home_page(folder: &str, notice: Option<&str>) -> String {
    let notice = notice
        .map(|n| format!("<p class=\"notice\">{}</p>", escape(n)))
        .unwrap_or_default();
    layout(
        "File drop",
        &format!(
            "<h1>Upload files</h1>{notice}\
             <p>Your folder: <a href=\"{}\">{}</a></p>\
             <form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
             <input type=\"file\" name=\"file\" multiple required> \
             <button type=\"submit\">Upload</button></form>",
            escape(&folder_url(folder)),
            escape(folder)
        ),
    )
}

pub fn listing_page(title: &str, breadcrumb: &[(&str, Option<String>)], items: &[ListItem]) -> String {
    let crumbs = breadcrumb
        .iter()
        .map(|(label, href)| match href {
            Some(href) => format!("<a href=\"{}\">{}</a>", escape(href), escape(label)),
            None => escape(label),
        })
        .collect::<Vec<_>>()
        .join(" / ");

    let body = if items.is_empty() {
        "<p class=\"empty\">No items here yet.</p>".to_string()
    } else {
        let rows: String = items.iter().map(list_row).collect();
        let script = if items.iter().any(|i| i.pin_folder.is_some()) {
            PIN_MENU_SCRIPT
        } else {
            ""
        };
        format!("<ul class=\"card-list\">{rows}</ul>{script}")
    };

    layout(
        title,
        &format!("<p class=\"breadcrumb\">{crumbs}</p><h1>{}</h1>{body}", escape(title)),
    )
}

/// Drives the owner's PIN button through `POST /uploads/{folder}/set-pin`.
const PIN_MENU_SCRIPT: &str = r#"<script>
document.querySelectorAll(".js-pin-menu").forEach(function (btn) {
  btn.addEventListener("click", async function () {
    var folder = btn.dataset.folder;
    var body = {};
    if (btn.dataset.hasPin === "true") {
      var current = prompt("Current PIN:");
      if (current === null) return;
      var next = prompt("New PIN (leave empty to remove protection):");
      if (next === null) return;
      body = next === "" ? { remove: true, current_pin: current } : { pin: next, current_pin: current };
    } else {
      var pin = prompt("New PIN (at least 4 characters):");
      if (!pin) return;
      body = { pin: pin };
    }
    var res = await fetch("/uploads/" + encodeURIComponent(folder) + "/set-pin", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(body)
    });
    var data = await res.json().catch(function () { return {}; });
    if (!data.ok) { alert(data.error || "Could not update PIN."); return; }
    if (data.failed_files) { alert("Some files could not be converted: " + data.failed_files.join(", ")); }
    location.reload();
  });
});
</script>"#;

fn list_row(item: &ListItem) -> String {
    let lock = if item.has_pin {
        "<span class=\"lock-icon\" title=\"Protected\">&#128274;</span> "
    } else {
        ""
    };
    let mut row = format!(
        "<li><a href=\"{}\">{lock}{}</a>",
        escape(&item.url),
        escape(&item.label)
    );
    if let Some(folder) = &item.pin_folder {
        row.push_str(&format!(
            " <button type=\"button\" class=\"js-pin-menu\" data-folder=\"{}\" data-has-pin=\"{}\">PIN</button>",
            escape(folder),
            item.has_pin
        ));
    }
    if let Some(delete_url) = &item.delete_url {
        row.push_str(&format!(
            " <form method=\"post\" action=\"{}\" class=\"delete-form\" \
             onsubmit=\"return confirm('{}')\"><button type=\"submit\">Delete</button></form>",
            escape(delete_url),
            escape(item.delete_message)
        ));
    }
    row.push_str("</li>");
    row
}

pub fn folder_not_found_page() -> String {
    layout(
        "Folder not found",
        "<h1>Folder not found</h1><p>This folder does not exist or was deleted.</p>",
    )
}

pub fn folder_deleted_page(folder: &str) -> String {
    layout(
        "Folder deleted",
        &format!(
            "<h1>Folder deleted</h1><p>The folder {} and all its files were deleted \
             after too many wrong PINs.</p>",
            escape(folder)
        ),
    )
}

/// Generic failure page for the browser flows.
pub fn error_page(folder: &str, message: &str) -> String {
    layout(
        "Error",
        &format!(
            "<h1>Something went wrong</h1><p>{}</p><p><a href=\"{}\">Back to folder</a></p>",
            escape(message),
            escape(&folder_url(folder))
        ),
    )
}

pub fn pin_entry_page(folder: &str, next: &str, prompt: &PinPrompt) -> String {
    let (message, confirm) = match prompt {
        PinPrompt::Enter => (String::new(), false),
        PinPrompt::Error(msg) => (format!("<p class=\"error\">{}</p>", escape(msg)), false),
        PinPrompt::ConfirmFinal(msg) => (format!("<p class=\"error\">{}</p>", escape(msg)), true),
    };
    let confirm_box = if confirm {
        "<label><input type=\"checkbox\" name=\"confirm_final_attempt\" value=\"1\" required> \
         I understand a wrong PIN now deletes this folder permanently.</label>"
    } else {
        ""
    };

    layout(
        "Enter PIN",
        &format!(
            "<h1>Folder {} is protected</h1>{message}\
             <form method=\"post\" action=\"{}/pin\">\
             <input type=\"hidden\" name=\"next\" value=\"{}\">\
             <input type=\"password\" name=\"pin\" autocomplete=\"off\" autofocus required> \
             {confirm_box}<button type=\"submit\">Unlock</button></form>",
            escape(folder),
            escape(&folder_url(folder)),
            escape(next)
        ),
    )
}
