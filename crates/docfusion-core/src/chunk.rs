//! Paragraph-boundary text chunker.
//!
//! Splits extracted text into chunks of at most `max_tokens` (estimated at
//! four characters per token). Paragraphs (`\n\n`) are packed greedily; a
//! paragraph longer than the limit is hard-split at the last whitespace that
//! fits. Blank text yields no chunks.
//!
//! ```rust
//! use docfusion_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 700);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

const CHARS_PER_TOKEN: usize = 4;

pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !buf.is_empty() && buf.len() + 2 + para.len() > max_chars {
            chunks.push(std::mem::take(&mut buf));
        }
        if para.len() > max_chars {
            hard_split(para, max_chars, &mut chunks);
            continue;
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

fn hard_split(mut rest: &str, max_chars: usize, out: &mut Vec<String>) {
    while rest.len() > max_chars {
        let mut cut = floor_char_boundary(rest, max_chars);
        if cut == 0 {
            cut = rest
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
        }
        if let Some(ws) = rest[..cut].rfind(char::is_whitespace) {
            if ws > 0 {
                cut = ws;
            }
        }
        let (head, tail) = rest.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            out.push(head.to_string());
        }
        rest = tail.trim_start();
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
