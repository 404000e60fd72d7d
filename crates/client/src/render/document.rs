//! Styled HTML shell for email bodies.

/// Wrap an email body in a full document pinned to `width` CSS pixels.
///
/// Images are clamped to the column, preformatted text wraps, and the body
/// gets the card padding and off-white background used by the feed.
pub fn wrap_document(html: &str, width: u32) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width={width}, initial-scale=1.0, maximum-scale=1.0">
    <style>
      * {{ box-sizing: border-box; }}
      html, body {{ margin: 0; padding: 0; width: {width}px; overflow: hidden; }}
      body {{ font-family: -apple-system, Helvetica, Arial, sans-serif; font-size: 15px; line-height: 1.5; color: #222; padding: 16px; background: #f7f7f7; }}
      img {{ max-width: 100%; height: auto; display: block; }}
      a {{ color: #111; }}
      pre, code {{ white-space: pre-wrap; word-wrap: break-word; }}
      table {{ max-width: 100%; }}
    </style>
  </head>
  <body>{html}</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_pins_width() {
        let doc = wrap_document("<p>hi</p>", 360);
        assert!(doc.contains("width=360,"));
        assert!(doc.contains("width: 360px;"));
    }

    #[test]
    fn test_wrap_embeds_body() {
        let doc = wrap_document("<table><tr><td>x</td></tr></table>", 320);
        assert!(doc.contains("<body><table><tr><td>x</td></tr></table></body>"));
        assert!(doc.starts_with("<!DOCTYPE html>"));
    }
}
