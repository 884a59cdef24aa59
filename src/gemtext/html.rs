//! HTML rendering of itemized gemtext
//!
//! Runs of preformatted lines share one `<pre>` and runs of list items share
//! one `<ul>`. Every piece of document text, link targets included, is
//! escaped.

use std::io::{self, Write};

use super::{Line, LineKind};

/// Write `lines` to `w` as an HTML fragment.
pub fn to_html<W: Write>(lines: &[Line], w: &mut W) -> io::Result<()> {
    let mut last: Option<LineKind> = None;

    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).map(|l| l.kind);
        let display = escape(&line.display);

        match line.kind {
            LineKind::Link => {
                let href = escape(line.link.as_deref().unwrap_or_default());
                writeln!(w, "<a href=\"{href}\">{display}</a><br>")?;
            }
            LineKind::Preformatted => {
                if last != Some(LineKind::Preformatted) {
                    w.write_all(b"<pre>")?;
                }
                w.write_all(escape(&line.raw).as_bytes())?;
                if next != Some(LineKind::Preformatted) {
                    w.write_all(b"</pre>")?;
                }
                w.write_all(b"\n")?;
            }
            LineKind::Text => writeln!(w, "{display}<br>")?,
            LineKind::List => {
                if last != Some(LineKind::List) {
                    writeln!(w, "<ul>")?;
                }
                writeln!(w, "<li>{display}</li>")?;
                if next != Some(LineKind::List) {
                    writeln!(w, "</ul>")?;
                }
            }
            LineKind::Heading1 => writeln!(w, "<h1>{display}</h1>")?,
            LineKind::Heading2 => writeln!(w, "<h2>{display}</h2>")?,
            LineKind::Heading3 => writeln!(w, "<h3>{display}</h3>")?,
            LineKind::Quote => writeln!(w, "<i>{display}</i><br>")?,
        }
        last = Some(line.kind);
    }

    Ok(())
}

/// Render to a `String`.
pub fn render(lines: &[Line]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = to_html(lines, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
