//! Keystroke constants and log rendering

pub const ESC: &[u8] = b"\x1b";
pub const SPACE: &[u8] = b" ";
pub const CTRL_Q: &[u8] = &[ctrl(b'q')];

/// Control code for a letter key (`ctrl(b'q')` is 0x11)
pub const fn ctrl(key: u8) -> u8 {
    key & 0x1f
}

/// Render keystrokes for a log line: `^X` for control codes, `\n` `\r` `\t`
/// for whitespace, `DEL`, and `\xNN` for anything outside ASCII.
pub fn printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x00..=0x1f => {
                out.push('^');
                out.push((b + b'@') as char);
            }
            0x7f => out.push_str("DEL"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}
