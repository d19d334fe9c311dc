use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use unicode_segmentation::UnicodeSegmentation;

/// Splits `text` into ordered segments of at most `max_len` graphemes,
/// preferring to break on whitespace. An empty body still yields one empty
/// segment so attachment-only messages produce a send.
pub fn split_msg(text: &str, max_len: usize) -> Vec<String> {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut start = 0;
    while start < graphemes.len() {
        let remaining = graphemes.len() - start;
        if remaining <= max_len {
            segments.push(graphemes[start..].concat());
            break;
        }
        let window = &graphemes[start..start + max_len];
        let cut = match window.iter().rposition(|g| g.trim().is_empty()) {
            Some(0) | None => max_len,
            Some(at) => at,
        };
        segments.push(graphemes[start..start + cut].concat());
        start += cut;
        while start < graphemes.len() && graphemes[start].trim().is_empty() {
            start += 1;
        }
    }

    segments.retain(|segment| !segment.is_empty());
    if segments.is_empty() {
        segments.push(String::new());
    }
    segments
}

/// Recovers bodies some providers deliver base64-encoded (concatenated SMS
/// relayed as MMS). Returns the input unchanged unless it is plausible
/// base64 that decodes to mostly printable text.
pub fn decode_possible_base64(original: &str) -> String {
    let stripped: String = original
        .trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();
    if stripped.len() < 50 || stripped.len() % 4 != 0 {
        return original.to_string();
    }
    let Ok(decoded) = B64.decode(stripped.as_bytes()) else {
        return original.to_string();
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return original.to_string();
    };
    let total = decoded.chars().count();
    if total == 0 {
        return original.to_string();
    }
    let printable = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    if printable * 10 >= total * 9 {
        decoded
    } else {
        original.to_string()
    }
}
