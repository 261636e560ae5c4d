// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZPL template rendering.
//
// Rendering is plain text substitution: `$FIELD$` placeholders are replaced
// by encoded field values, then a fixed series of device normalizations is
// applied.  Field values are encoded for `^FH` hex escapes: backslash first,
// then the characters the printers' code page needs as escapes.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

use etikett_core::types::ParsedLabelRequest;

/// Escape for a literal backslash. Applied before the special characters.
pub const BACKSLASH_ESCAPE: &str = "\\1F";

/// Special characters and their code page 850 hex escapes.
pub const SPECIAL_CHARACTERS: [(char, &str); 10] = [
    ('Ö', "\\99"),
    ('ö', "\\94"),
    ('Ü', "\\9A"),
    ('ü', "\\81"),
    ('Ä', "\\8E"),
    ('ä', "\\84"),
    ('ß', "\\E1"),
    ('Ø', "\\9D"),
    ('µ', "\\E6"),
    ('~', "\\7E"),
];

/// Media tracking: continuous → non-continuous (web sensing).
const MEDIA_TRACKING: (&str, &str) = ("^MTT", "^MTD");
/// Print mode tear-off, the non-peel default.
const MODE_TEAR_OFF: &str = "^MMT";
/// Print mode peel-off.
const MODE_PEEL_OFF: &str = "^MMP";
/// Print mode kiosk, used for peel devices.
const MODE_KIOSK: &str = "^MMK";
/// Print/slew/backfeed speed every label is forced to.
const PRINT_RATE: &str = "^PR12,12";

static PRINT_RATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^PR\d+,\d+").expect("print rate pattern is valid"));

/// Encode one field value for inclusion in a ZPL field.
pub fn encode_field(value: &str) -> String {
    let mut encoded = value.replace('\\', BACKSLASH_ESCAPE);
    for (character, escape) in SPECIAL_CHARACTERS {
        encoded = encoded.replace(character, escape);
    }
    encoded
}

/// Render `template` for `request` at the current local time.
pub fn render_label(template: &str, request: &ParsedLabelRequest, peel_off: bool) -> String {
    render_label_at(template, request, peel_off, Local::now())
}

/// Render `template` for `request` with an explicit timestamp.
pub fn render_label_at(
    template: &str,
    request: &ParsedLabelRequest,
    peel_off: bool,
    now: DateTime<Local>,
) -> String {
    let mut label = template.to_string();

    for (name, value) in &request.fields {
        label = label.replace(&format!("${name}$"), &encode_field(value));
    }

    label = label.replace("$DATE$", &now.format("%Y-%m-%d").to_string());
    label = label.replace("$TIME$", &now.format("%H:%M:%S").to_string());
    label = label.replace("$PRINTER$", &request.target_printer);
    label = label.replace(MEDIA_TRACKING.0, MEDIA_TRACKING.1);

    if peel_off {
        label = label.replace(MODE_TEAR_OFF, MODE_KIOSK);
    } else {
        label = label.replace(MODE_PEEL_OFF, MODE_TEAR_OFF);
        label = label.replace(MODE_KIOSK, MODE_TEAR_OFF);
    }

    PRINT_RATE_PATTERN.replace_all(&label, PRINT_RATE).into_owned()
}
