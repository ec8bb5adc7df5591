//! 语言目录
//!
//! 源语言列表在下标 0 处多一个 "Auto-detect"，目标语言从下标 1 开始。
//! 越界下标回退到 Auto-detect / English。

/// 自动检测
pub const AUTO_DETECT: &str = "Auto-detect";

/// 默认目标语言
pub const DEFAULT_TARGET_LANGUAGE: &str = "English";

/// 可选语言（下标 1..=8）
pub const LANGUAGES: [&str; 8] = [
    "English",
    "Spanish",
    "French",
    "German",
    "Russian",
    "Arabic",
    "Mandarin (Standard Chinese)",
    "Japanese",
];

/// 按下标查找源语言（0 为 Auto-detect）
pub fn source_language(index: usize) -> &'static str {
    match index {
        0 => AUTO_DETECT,
        i => LANGUAGES.get(i - 1).copied().unwrap_or(AUTO_DETECT),
    }
}

/// 按下标查找目标语言（1 起）
pub fn target_language(index: usize) -> &'static str {
    index
        .checked_sub(1)
        .and_then(|i| LANGUAGES.get(i).copied())
        .unwrap_or(DEFAULT_TARGET_LANGUAGE)
}

/// 全部源语言（含 Auto-detect）
pub fn source_languages() -> impl Iterator<Item = (usize, &'static str)> {
    std::iter::once((0, AUTO_DETECT)).chain(target_languages())
}

/// 全部目标语言
pub fn target_languages() -> impl Iterator<Item = (usize, &'static str)> {
    LANGUAGES.iter().enumerate().map(|(i, name)| (i + 1, *name))
}

/// 按名称查找目标语言下标（忽略大小写）
pub fn target_index(name: &str) -> Option<usize> {
    target_languages()
        .find(|(_, language)| language.eq_ignore_ascii_case(name))
        .map(|(index, _)| index)
}

/// 按名称查找源语言下标（忽略大小写）
pub fn source_index(name: &str) -> Option<usize> {
    source_languages()
        .find(|(_, language)| language.eq_ignore_ascii_case(name))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_language_lookup() {
        assert_eq!(source_language(0), "Auto-detect");
        assert_eq!(source_language(2), "Spanish");
        assert_eq!(source_language(7), "Mandarin (Standard Chinese)");
        assert_eq!(source_language(99), "Auto-detect");
    }

    #[test]
    fn test_target_language_lookup() {
        assert_eq!(target_language(1), "English");
        assert_eq!(target_language(8), "Japanese");
        assert_eq!(target_language(0), "English");
        assert_eq!(target_language(9), "English");
    }

    #[test]
    fn test_catalogue_sizes() {
        assert_eq!(source_languages().count(), 9);
        assert_eq!(target_languages().count(), 8);
    }

    #[test]
    fn test_index_by_name() {
        assert_eq!(target_index("french"), Some(3));
        assert_eq!(target_index("Auto-detect"), None);
        assert_eq!(source_index("auto-detect"), Some(0));
        assert_eq!(source_index("Klingon"), None);
    }
}
