use std::borrow::Cow;

/// Replace `:shortcode:` sequences with their emoji glyph.
///
/// Unknown shortcodes are left exactly as typed.
pub fn substitute_shortcodes(text: &str) -> Cow<'_, str> {
    if !text.contains(':') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name_len = after.bytes().take_while(|b| is_shortcode_byte(*b)).count();
        if name_len > 0
            && after[name_len..].starts_with(':')
            && let Some(emoji) = emojis::get_by_shortcode(&after[..name_len])
        {
            out.push_str(emoji.as_str());
            rest = &after[name_len + 1..];
            continue;
        }
        out.push(':');
        rest = after;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn is_shortcode_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'+' | b'-')
}
