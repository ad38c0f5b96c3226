use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_NUMERIC_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)[-‐‑‒–—―−ー]+(\d)").unwrap());

fn unify_wave(c: char) -> char {
    match c {
        '~' | '∼' | '〜' | '～' => '〜',
        _ => c,
    }
}

/// ブリーフ項目ラベルの照合キー化
///
/// 入力揺れ（全角/半角・波ダッシュの種類・桁区切り・空白）を吸収する:
/// 1. NFKC（全角英数記号・全角スペース・半角カナを寄せる）
/// 2. チルダ類はすべて "〜" に統一
/// 3. 空白と桁区切りカンマを除去
/// 4. 数字に挟まれたハイフン類は範囲区切り "〜" とみなす
/// 5. ASCII は小文字化
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .nfkc()
        .map(unify_wave)
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '、')
        .collect();

    RE_NUMERIC_RANGE
        .replace_all(&folded, "${1}〜${2}")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_full_width_digits_and_commas() {
        assert_eq!(normalize_label("〜１，０００万円"), "〜1000万円");
        assert_eq!(normalize_label("~1,000万円"), "〜1000万円");
        assert_eq!(normalize_label("～1000万円"), "〜1000万円");
    }

    #[test]
    fn unifies_range_separators_between_digits() {
        assert_eq!(normalize_label("女性20-34歳"), "女性20〜34歳");
        assert_eq!(normalize_label("女性２０－３４歳"), "女性20〜34歳");
        assert_eq!(normalize_label("女性20〜34歳"), "女性20〜34歳");
        assert_eq!(normalize_label("女性 20ー34歳"), "女性20〜34歳");
    }

    #[test]
    fn strips_spaces_and_lowercases_ascii() {
        assert_eq!(normalize_label("　アルコール飲料 "), "アルコール飲料");
        assert_eq!(normalize_label("ＩＴ　サービス"), "itサービス");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_label(""), "");
        assert_eq!(normalize_label("　 "), "");
    }
}
