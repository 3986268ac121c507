//! 分页器
//! 按字数预算把正文切分为页面序列，预算随字号线性缩放

/// 基准字号下的每页字数（对应阅读视图的双栏排版）
pub const BASE_WORDS_PER_PAGE: u32 = 800;

/// 基准字号（像素）
pub const BASE_FONT_SIZE_PX: u32 = 18;

/// 指定字号下的每页字数预算
/// 向下取整；极端缩放下至少保留 1，避免零长切片
pub fn words_per_page(font_size_px: u32) -> usize {
    let budget =
        (BASE_WORDS_PER_PAGE as u64 * font_size_px as u64) / (BASE_FONT_SIZE_PX as u64);
    budget.max(1) as usize
}

/// 正文的分词字数（按空白切分）
pub fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// 指定字数与字号对应的页数，至少为 1
pub fn page_count(word_count: usize, font_size_px: u32) -> u32 {
    let per_page = words_per_page(font_size_px);
    word_count.div_ceil(per_page).max(1) as u32
}

/// 把正文切分为页面序列
/// 纯函数：同样的 (正文, 字号) 永远得到同样的结果；空正文产出一个空页，
/// 保证任何时候 pages.len() >= 1
pub fn paginate(body: &str, font_size_px: u32) -> Vec<String> {
    let per_page = words_per_page(font_size_px);
    let words: Vec<&str> = body.split_whitespace().collect();
    let mut pages: Vec<String> = words
        .chunks(per_page)
        .map(|chunk| chunk.join(" "))
        .collect();
    if pages.is_empty() {
        pages.push(String::new());
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 生成 word1 word2 ... wordN 形式的正文
    fn body_of(n: usize) -> String {
        (1..=n)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_base_budget() {
        // 18px 基准字号下预算就是 800
        assert_eq!(words_per_page(18), 800);
        // floor(800 * 24 / 18) = 1066
        assert_eq!(words_per_page(24), 1066);
        // floor(800 * 12 / 18) = 533
        assert_eq!(words_per_page(12), 533);
    }

    #[test]
    fn test_budget_never_zero() {
        assert_eq!(words_per_page(0), 1);
    }

    #[test]
    fn test_1600_words_at_18px_gives_two_full_pages() {
        let pages = paginate(&body_of(1600), 18);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].split_whitespace().count(), 800);
        assert_eq!(pages[1].split_whitespace().count(), 800);
        assert!(pages[0].starts_with("word1 "));
        assert!(pages[1].starts_with("word801 "));
    }

    #[test]
    fn test_empty_body_yields_single_empty_page() {
        assert_eq!(paginate("", 18), vec![String::new()]);
        // 纯空白正文同样只有一个空页
        assert_eq!(paginate("  \n\t  ", 18), vec![String::new()]);
    }

    #[test]
    fn test_deterministic() {
        let body = body_of(2500);
        assert_eq!(paginate(&body, 18), paginate(&body, 18));
        assert_eq!(paginate(&body, 21), paginate(&body, 21));
    }

    #[test]
    fn test_larger_font_never_adds_pages() {
        // 预算随字号增大，页数只会不变或变少
        let body = body_of(3000);
        for (small, large) in [(12u32, 18u32), (18, 24), (14, 22)] {
            assert!(paginate(&body, large).len() <= paginate(&body, small).len());
        }
    }

    #[test]
    fn test_multiline_whitespace_is_collapsed() {
        let pages = paginate("one\n\ntwo\tthree   four", 18);
        assert_eq!(pages, vec!["one two three four".to_string()]);
    }

    #[test]
    fn test_page_count_matches_paginate() {
        for n in [0usize, 1, 799, 800, 801, 1600, 1601, 5000] {
            let body = body_of(n);
            for font in [12u32, 18, 24] {
                assert_eq!(
                    paginate(&body, font).len() as u32,
                    page_count(word_count(&body), font),
                    "n={} font={}",
                    n,
                    font
                );
            }
        }
    }
}
