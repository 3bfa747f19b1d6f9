//! Text transforms for product, department and supplier cells.

use regex::Regex;
use std::sync::OnceLock;

static CJK_RUN: OnceLock<Regex> = OnceLock::new();

fn cjk_run() -> &'static Regex {
    CJK_RUN.get_or_init(|| Regex::new(r"[\x{4E00}-\x{9FFF}]+").expect("cjk run regex"))
}

/// CJK Unified Ideographs block (U+4E00..=U+9FFF).
pub fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Put the Latin prefix and the CJK part on separate lines ("ABC你好" → "ABC\n你好").
/// Text without a CJK character, or with nothing before it, is returned unchanged.
pub fn split_mixed_script(text: &str) -> String {
    let Some(pos) = text.find(is_cjk) else {
        return text.to_string();
    };
    let latin = text[..pos].trim();
    let cjk = text[pos..].trim();
    if latin.is_empty() || cjk.is_empty() {
        return text.to_string();
    }
    format!("{}\n{}", latin, cjk)
}

/// Concatenate every CJK run in `text`. Returns the input unchanged when it has none.
pub fn extract_cjk(text: &str) -> String {
    let joined: String = cjk_run().find_iter(text).map(|m| m.as_str()).collect();
    if joined.is_empty() {
        text.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_latin_prefix_from_cjk() {
        assert_eq!(split_mixed_script("ABC你好"), "ABC\n你好");
        assert_eq!(split_mixed_script("  Fresh Milk 鲜牛奶 1L "), "Fresh Milk\n鲜牛奶 1L");
    }

    #[test]
    fn split_leaves_single_script_text_alone() {
        assert_eq!(split_mixed_script("你好"), "你好");
        assert_eq!(split_mixed_script("ABC"), "ABC");
        assert_eq!(split_mixed_script(""), "");
        // whitespace-only prefix does not count as Latin text
        assert_eq!(split_mixed_script("   你好"), "   你好");
    }

    #[test]
    fn extract_keeps_only_cjk_runs() {
        assert_eq!(extract_cjk("上海 Foods 食品有限公司 VAT"), "上海食品有限公司");
        assert_eq!(extract_cjk("供应商"), "供应商");
    }

    #[test]
    fn extract_without_cjk_is_identity() {
        assert_eq!(extract_cjk("ACME Trading"), "ACME Trading");
        assert_eq!(extract_cjk(""), "");
    }
}
