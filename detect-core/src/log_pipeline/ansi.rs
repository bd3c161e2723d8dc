//! Hand-rolled ANSI CSI stripping.
//!
//! Removes ECMA-48 CSI sequences (the `ESC[ ... final-byte` family, which
//! includes SGR/color codes) without pulling in a regex for a scan this
//! narrow.

/// Strip ECMA-48 CSI escape sequences from a line, leaving all other text
/// untouched.
#[must_use]
pub fn strip_ansi(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'[') {
            let mut j = i + 2;
            // Parameter bytes 0x30-0x3F, intermediate bytes 0x20-0x2F.
            while j < bytes.len() && (0x30..=0x3f).contains(&bytes[j]) {
                j += 1;
            }
            while j < bytes.len() && (0x20..=0x2f).contains(&bytes[j]) {
                j += 1;
            }
            // Final byte 0x40-0x7E.
            if j < bytes.len() && (0x40..=0x7e).contains(&bytes[j]) {
                i = j + 1;
                continue;
            }
            // Malformed sequence: fall through and copy the ESC byte
            // verbatim rather than consuming unrelated input.
        }
        // Safe: we only skip over ASCII escape bytes above, so `i` always
        // lands on a UTF-8 char boundary here.
        let ch_len = input[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&input[i..i + ch_len]);
        i += ch_len;
    }

    out
}
