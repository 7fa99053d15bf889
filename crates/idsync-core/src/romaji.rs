//! Deterministic kana-to-romaji transliteration.
//!
//! Fixed mapping table over hiragana and katakana, with digraphs
//! (キャ→kya, シャ→sha), sokuon gemination (ッ doubles the following
//! consonant, `ch` geminates as `tch`), and the long-vowel mark ー repeating
//! the previous vowel. Characters outside the table pass through unchanged
//! and are removed by identifier normalization downstream.
//!
//! The same input always yields the same output; there is no locale or
//! environment dependence.

/// Transliterate a kana string into lowercase romaji.
pub fn transliterate(kana: &str) -> String {
    let chars: Vec<char> = kana.chars().map(to_katakana).collect();
    let mut out = String::with_capacity(kana.len() * 2);
    let mut geminate = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == 'ッ' {
            geminate = true;
            i += 1;
            continue;
        }

        if c == 'ー' {
            if let Some(v) = out.chars().last().filter(|v| is_vowel(*v)) {
                out.push(v);
            }
            i += 1;
            continue;
        }

        let Some(base) = mora(c) else {
            out.push(c);
            geminate = false;
            i += 1;
            continue;
        };

        let mut syllable = base.to_string();
        if let Some(&next) = chars.get(i + 1) {
            if let Some(glide) = small_y(next) {
                if let Some(stem) = syllable.strip_suffix('i') {
                    // Hepburn: sh/ch/j absorb the glide's y
                    // (シャ→sha, チャ→cha, ジャ→ja).
                    let glide = if stem.ends_with('h') || stem == "j" {
                        &glide[1..]
                    } else {
                        glide
                    };
                    syllable = format!("{stem}{glide}");
                    i += 1;
                }
            } else if let Some(v) = small_vowel(next) {
                if syllable.chars().last().is_some_and(is_vowel) {
                    syllable.pop();
                    syllable.push(v);
                    i += 1;
                }
            }
        }

        if geminate {
            if syllable.starts_with("ch") {
                out.push('t');
            } else if let Some(first) = syllable.chars().next().filter(|f| !is_vowel(*f)) {
                out.push(first);
            }
            geminate = false;
        }

        out.push_str(&syllable);
        i += 1;
    }

    out
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

/// Fold hiragana onto the katakana block so one table covers both.
fn to_katakana(c: char) -> char {
    match c {
        '\u{3041}'..='\u{3096}' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
        _ => c,
    }
}

fn small_y(c: char) -> Option<&'static str> {
    match c {
        'ャ' => Some("ya"),
        'ュ' => Some("yu"),
        'ョ' => Some("yo"),
        _ => None,
    }
}

fn small_vowel(c: char) -> Option<char> {
    match c {
        'ァ' => Some('a'),
        'ィ' => Some('i'),
        'ゥ' => Some('u'),
        'ェ' => Some('e'),
        'ォ' => Some('o'),
        _ => None,
    }
}

/// Base reading of a single kana, Hepburn without macrons.
fn mora(c: char) -> Option<&'static str> {
    let s = match c {
        'ア' => "a",
        'イ' => "i",
        'ウ' => "u",
        'エ' => "e",
        'オ' => "o",
        'カ' => "ka",
        'キ' => "ki",
        'ク' => "ku",
        'ケ' => "ke",
        'コ' => "ko",
        'ガ' => "ga",
        'ギ' => "gi",
        'グ' => "gu",
        'ゲ' => "ge",
        'ゴ' => "go",
        'サ' => "sa",
        'シ' => "shi",
        'ス' => "su",
        'セ' => "se",
        'ソ' => "so",
        'ザ' => "za",
        'ジ' => "ji",
        'ズ' => "zu",
        'ゼ' => "ze",
        'ゾ' => "zo",
        'タ' => "ta",
        'チ' => "chi",
        'ツ' => "tsu",
        'テ' => "te",
        'ト' => "to",
        'ダ' => "da",
        'ヂ' => "ji",
        'ヅ' => "zu",
        'デ' => "de",
        'ド' => "do",
        'ナ' => "na",
        'ニ' => "ni",
        'ヌ' => "nu",
        'ネ' => "ne",
        'ノ' => "no",
        'ハ' => "ha",
        'ヒ' => "hi",
        'フ' => "fu",
        'ヘ' => "he",
        'ホ' => "ho",
        'バ' => "ba",
        'ビ' => "bi",
        'ブ' => "bu",
        'ベ' => "be",
        'ボ' => "bo",
        'パ' => "pa",
        'ピ' => "pi",
        'プ' => "pu",
        'ペ' => "pe",
        'ポ' => "po",
        'マ' => "ma",
        'ミ' => "mi",
        'ム' => "mu",
        'メ' => "me",
        'モ' => "mo",
        'ヤ' => "ya",
        'ユ' => "yu",
        'ヨ' => "yo",
        'ラ' => "ra",
        'リ' => "ri",
        'ル' => "ru",
        'レ' => "re",
        'ロ' => "ro",
        'ワ' => "wa",
        'ヲ' => "wo",
        'ン' => "n",
        'ヴ' => "vu",
        // Standalone smalls read as their plain form.
        'ァ' => "a",
        'ィ' => "i",
        'ゥ' => "u",
        'ェ' => "e",
        'ォ' => "o",
        'ャ' => "ya",
        'ュ' => "yu",
        'ョ' => "yo",
        _ => return None,
    };
    Some(s)
}
