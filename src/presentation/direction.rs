//! Text directionality.

use std::sync::LazyLock;

use regex::Regex;

/// Hebrew, Arabic/Persian, Syriac, Thaana, NKo, Samaritan, Mandaic,
/// Arabic Extended, and the Hebrew/Arabic presentation forms.
static RTL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{0590}-\x{08FF}\x{FB1D}-\x{FDFF}\x{FE70}-\x{FEFF}]")
        .expect("static RTL pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    /// RTL if any character falls in a right-to-left script block.
    pub fn detect(text: &str) -> Self {
        if RTL_CHARS.is_match(text) {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        }
    }

    /// CSS `direction` value.
    pub fn css(self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }

    /// CSS `text-align` value.
    pub fn align(self) -> &'static str {
        match self {
            TextDirection::Ltr => "left",
            TextDirection::Rtl => "right",
        }
    }
}
