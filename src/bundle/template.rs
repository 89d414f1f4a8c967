//! HTML template wrapping.

use std::sync::Arc;

use crate::asset::transform::map_text;
use crate::asset::{OpenStream, Transformer};
use crate::core::AppPath;

/// Wraps each template in `<script id=".." type="text/html">` so the
/// concatenated bundle can be embedded in a page.
pub struct WrapHtmlTemplate {
    bundle: AppPath,
}

impl WrapHtmlTemplate {
    pub fn new(bundle: AppPath) -> Arc<Self> {
        Arc::new(Self { bundle })
    }

    /// Element id: path inside the bundle without extension, `/` as `-`.
    pub fn template_id(&self, asset: &AppPath) -> String {
        let relative = asset.strip_dir(&self.bundle).unwrap_or(asset.file_name());
        let stem = match relative.rfind('.') {
            Some(dot) if dot > relative.rfind('/').map_or(0, |slash| slash + 1) => &relative[..dot],
            _ => relative,
        };
        stem.replace('/', "-")
    }
}

impl Transformer for WrapHtmlTemplate {
    fn name(&self) -> &'static str {
        "wrap-html-template"
    }

    fn transform(&self, open: OpenStream, asset: &AppPath) -> OpenStream {
        let id = self.template_id(asset);
        map_text(open, move |text| {
            format!("<script id=\"{id}\" type=\"text/html\">{text}</script>")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::transform::read_all;
    use crate::fs::Stream;
    use std::io::Cursor;

    fn p(raw: &str) -> AppPath {
        AppPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_template_id() {
        let wrap = WrapHtmlTemplate::new(p("~/templates"));
        assert_eq!(wrap.template_id(&p("~/templates/user/row.html")), "user-row");
        assert_eq!(wrap.template_id(&p("~/templates/list.htm")), "list");
        assert_eq!(wrap.template_id(&p("~/elsewhere/card.html")), "card");
    }

    #[test]
    fn test_wraps_content() {
        let wrap = WrapHtmlTemplate::new(p("~/templates"));
        let open: OpenStream =
            Box::new(|| Ok(Box::new(Cursor::new(b"<li></li>".to_vec())) as Stream));
        let out = read_all(wrap.transform(open, &p("~/templates/item.html"))).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<script id=\"item\" type=\"text/html\"><li></li></script>"
        );
    }
}
