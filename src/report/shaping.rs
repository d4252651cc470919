//! Arabic text preparation for a PDF writer that does no shaping of its own.
//!
//! Two steps turn a logical-order Arabic string into something that can be
//! drawn glyph by glyph from left to right:
//!
//! 1. [`reshape`] replaces each letter with its positional form from the
//!    Arabic Presentation Forms blocks (-B for the core alphabet, -A for
//!    Persian and Urdu letters) and fuses lam-alef pairs.
//! 2. [`visual_order`] runs the Unicode bidi algorithm and reverses
//!    right-to-left runs, mirroring brackets on the way.

use unicode_bidi::BidiInfo;

/// True if any character falls in the basic Arabic block (U+0600..=U+06FF).
pub fn is_arabic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}

/// Positional forms: isolated, final, initial, medial. Zero means absent.
/// Sorted by letter.
const LETTERS: &[(char, [u16; 4])] = &[
    ('\u{0621}', [0xFE80, 0, 0, 0]),
    ('\u{0622}', [0xFE81, 0xFE82, 0, 0]),
    ('\u{0623}', [0xFE83, 0xFE84, 0, 0]),
    ('\u{0624}', [0xFE85, 0xFE86, 0, 0]),
    ('\u{0625}', [0xFE87, 0xFE88, 0, 0]),
    ('\u{0626}', [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C]),
    ('\u{0627}', [0xFE8D, 0xFE8E, 0, 0]),
    ('\u{0628}', [0xFE8F, 0xFE90, 0xFE91, 0xFE92]),
    ('\u{0629}', [0xFE93, 0xFE94, 0, 0]),
    ('\u{062A}', [0xFE95, 0xFE96, 0xFE97, 0xFE98]),
    ('\u{062B}', [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C]),
    ('\u{062C}', [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0]),
    ('\u{062D}', [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4]),
    ('\u{062E}', [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8]),
    ('\u{062F}', [0xFEA9, 0xFEAA, 0, 0]),
    ('\u{0630}', [0xFEAB, 0xFEAC, 0, 0]),
    ('\u{0631}', [0xFEAD, 0xFEAE, 0, 0]),
    ('\u{0632}', [0xFEAF, 0xFEB0, 0, 0]),
    ('\u{0633}', [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4]),
    ('\u{0634}', [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8]),
    ('\u{0635}', [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC]),
    ('\u{0636}', [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0]),
    ('\u{0637}', [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4]),
    ('\u{0638}', [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8]),
    ('\u{0639}', [0xFEC9, 0xFECA, 0xFECB, 0xFECC]),
    ('\u{063A}', [0xFECD, 0xFECE, 0xFECF, 0xFED0]),
    ('\u{0640}', [0x0640, 0x0640, 0x0640, 0x0640]),
    ('\u{0641}', [0xFED1, 0xFED2, 0xFED3, 0xFED4]),
    ('\u{0642}', [0xFED5, 0xFED6, 0xFED7, 0xFED8]),
    ('\u{0643}', [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC]),
    ('\u{0644}', [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0]),
    ('\u{0645}', [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4]),
    ('\u{0646}', [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8]),
    ('\u{0647}', [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC]),
    ('\u{0648}', [0xFEED, 0xFEEE, 0, 0]),
    ('\u{0649}', [0xFEEF, 0xFEF0, 0, 0]),
    ('\u{064A}', [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4]),
    // Presentation Forms-A: Persian, Urdu and dialect letters (veh, peh, gaf, ...).
    ('\u{0671}', [0xFB50, 0xFB51, 0, 0]),
    ('\u{0679}', [0xFB66, 0xFB67, 0xFB68, 0xFB69]),
    ('\u{067A}', [0xFB5E, 0xFB5F, 0xFB60, 0xFB61]),
    ('\u{067B}', [0xFB52, 0xFB53, 0xFB54, 0xFB55]),
    ('\u{067E}', [0xFB56, 0xFB57, 0xFB58, 0xFB59]),
    ('\u{067F}', [0xFB62, 0xFB63, 0xFB64, 0xFB65]),
    ('\u{0680}', [0xFB5A, 0xFB5B, 0xFB5C, 0xFB5D]),
    ('\u{0683}', [0xFB76, 0xFB77, 0xFB78, 0xFB79]),
    ('\u{0684}', [0xFB72, 0xFB73, 0xFB74, 0xFB75]),
    ('\u{0686}', [0xFB7A, 0xFB7B, 0xFB7C, 0xFB7D]),
    ('\u{0687}', [0xFB7E, 0xFB7F, 0xFB80, 0xFB81]),
    ('\u{0688}', [0xFB88, 0xFB89, 0, 0]),
    ('\u{068C}', [0xFB84, 0xFB85, 0, 0]),
    ('\u{068D}', [0xFB82, 0xFB83, 0, 0]),
    ('\u{068E}', [0xFB86, 0xFB87, 0, 0]),
    ('\u{0691}', [0xFB8C, 0xFB8D, 0, 0]),
    ('\u{0698}', [0xFB8A, 0xFB8B, 0, 0]),
    ('\u{06A4}', [0xFB6A, 0xFB6B, 0xFB6C, 0xFB6D]),
    ('\u{06A6}', [0xFB6E, 0xFB6F, 0xFB70, 0xFB71]),
    ('\u{06A9}', [0xFB8E, 0xFB8F, 0xFB90, 0xFB91]),
    ('\u{06AD}', [0xFBD3, 0xFBD4, 0xFBD5, 0xFBD6]),
    ('\u{06AF}', [0xFB92, 0xFB93, 0xFB94, 0xFB95]),
    ('\u{06B1}', [0xFB9A, 0xFB9B, 0xFB9C, 0xFB9D]),
    ('\u{06B3}', [0xFB96, 0xFB97, 0xFB98, 0xFB99]),
    ('\u{06BA}', [0xFB9E, 0xFB9F, 0, 0]),
    ('\u{06BB}', [0xFBA0, 0xFBA1, 0xFBA2, 0xFBA3]),
    ('\u{06BE}', [0xFBAA, 0xFBAB, 0xFBAC, 0xFBAD]),
    ('\u{06C0}', [0xFBA4, 0xFBA5, 0, 0]),
    ('\u{06C1}', [0xFBA6, 0xFBA7, 0xFBA8, 0xFBA9]),
    ('\u{06C5}', [0xFBE0, 0xFBE1, 0, 0]),
    ('\u{06C6}', [0xFBD9, 0xFBDA, 0, 0]),
    ('\u{06C7}', [0xFBD7, 0xFBD8, 0, 0]),
    ('\u{06C8}', [0xFBDB, 0xFBDC, 0, 0]),
    ('\u{06C9}', [0xFBE2, 0xFBE3, 0, 0]),
    ('\u{06CB}', [0xFBDE, 0xFBDF, 0, 0]),
    ('\u{06CC}', [0xFBFC, 0xFBFD, 0xFBFE, 0xFBFF]),
    ('\u{06D0}', [0xFBE4, 0xFBE5, 0xFBE6, 0xFBE7]),
    ('\u{06D2}', [0xFBAE, 0xFBAF, 0, 0]),
    ('\u{06D3}', [0xFBB0, 0xFBB1, 0, 0]),
];

const LAM: char = '\u{0644}';

/// Lam-alef ligatures: alef variant, isolated, final.
const LAM_ALEF: &[(char, u16, u16)] = &[
    ('\u{0622}', 0xFEF5, 0xFEF6),
    ('\u{0623}', 0xFEF7, 0xFEF8),
    ('\u{0625}', 0xFEF9, 0xFEFA),
    ('\u{0627}', 0xFEFB, 0xFEFC),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    None,
    Right,
    Dual,
}

fn forms(c: char) -> Option<[u16; 4]> {
    LETTERS
        .binary_search_by_key(&c, |&(letter, _)| letter)
        .ok()
        .map(|idx| LETTERS[idx].1)
}

fn joining(c: char) -> Joining {
    match forms(c) {
        Some([_, _, initial, _]) if initial != 0 => Joining::Dual,
        Some([_, fin, _, _]) if fin != 0 => Joining::Right,
        _ => Joining::None,
    }
}

/// Harakat and other marks that sit on a letter without breaking the join.
fn is_transparent(c: char) -> bool {
    matches!(c, '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}')
}

fn to_char(code: u16) -> char {
    char::from_u32(code as u32).unwrap_or('\u{FFFD}')
}

/// Replace Arabic letters with their contextual presentation forms.
///
/// Characters outside the table pass through unchanged.
pub fn reshape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() * 2);

    let prev_letter = |i: usize| chars[..i].iter().rev().find(|c| !is_transparent(**c)).copied();
    let next_letter = |i: usize| {
        chars[i + 1..]
            .iter()
            .position(|c| !is_transparent(*c))
            .map(|offset| (i + 1 + offset, chars[i + 1 + offset]))
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let Some(shapes) = forms(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let joins_prev = joining(c) != Joining::None
            && prev_letter(i).is_some_and(|p| joining(p) == Joining::Dual);

        if c == LAM {
            if let Some((j, alef)) = next_letter(i) {
                if let Some(&(_, isolated, fin)) = LAM_ALEF.iter().find(|(a, _, _)| *a == alef) {
                    out.push(to_char(if joins_prev { fin } else { isolated }));
                    // Marks between lam and alef stay with the ligature.
                    out.extend(&chars[i + 1..j]);
                    i = j + 1;
                    continue;
                }
            }
        }

        let joins_next = joining(c) == Joining::Dual
            && next_letter(i).is_some_and(|(_, n)| joining(n) != Joining::None);

        let [isolated, fin, initial, medial] = shapes;
        let code = match (joins_prev, joins_next) {
            (false, false) => isolated,
            (true, false) => fin,
            (false, true) => initial,
            (true, true) => medial,
        };
        out.push(to_char(code));
        i += 1;
    }
    out
}

fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        other => other,
    }
}

/// Reorder a single line from logical to visual (left-to-right drawing) order.
pub fn visual_order(text: &str) -> String {
    let info = BidiInfo::new(text, None);
    if !info.has_rtl() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for para in &info.paragraphs {
        let (levels, runs) = info.visual_runs(para, para.range.clone());
        for run in runs {
            let slice = &text[run.clone()];
            if levels[run.start].is_rtl() {
                out.extend(slice.chars().rev().map(mirror));
            } else {
                out.push_str(slice);
            }
        }
    }
    out
}

/// Reshape then reorder: the string to hand to the PDF writer.
pub fn prepare_rtl(text: &str) -> String {
    visual_order(&reshape(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        assert!(LETTERS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn detects_arabic() {
        assert!(is_arabic("Result: طبيعي"));
        assert!(!is_arabic("Hemoglobin 13.5 g/dL"));
        assert!(!is_arabic(""));
    }

    #[test]
    fn single_letter_is_isolated() {
        assert_eq!(reshape("ب"), "\u{FE8F}");
    }

    #[test]
    fn dual_joining_letters_take_positional_forms() {
        // beh beh beh: initial, medial, final
        assert_eq!(reshape("ببب"), "\u{FE91}\u{FE92}\u{FE90}");
    }

    #[test]
    fn right_joining_letter_breaks_the_chain() {
        // dal joins to the beh before it but not to the beh after it
        assert_eq!(reshape("بدب"), "\u{FE91}\u{FEAA}\u{FE8F}");
    }

    #[test]
    fn extended_letters_take_positional_forms() {
        // Veh in "vitamin" is initial, not left untouched.
        assert_eq!(
            reshape("ڤيتامين"),
            "\u{FB6C}\u{FEF4}\u{FE98}\u{FE8E}\u{FEE3}\u{FEF4}\u{FEE6}"
        );
        assert_eq!(reshape("گب"), "\u{FB94}\u{FE90}");
        assert_eq!(reshape("پی"), "\u{FB58}\u{FBFD}");
    }

    #[test]
    fn extended_right_joining_letter_breaks_the_chain() {
        assert_eq!(reshape("بژب"), "\u{FE91}\u{FB8B}\u{FE8F}");
    }

    #[test]
    fn lam_alef_becomes_a_ligature() {
        assert_eq!(reshape("لا"), "\u{FEFB}");
        // "بلا": beh initial, then the final lam-alef
        assert_eq!(reshape("بلا"), "\u{FE91}\u{FEFC}");
    }

    #[test]
    fn harakat_do_not_break_joins() {
        // beh + fatha + beh
        assert_eq!(reshape("بَب"), "\u{FE91}\u{064E}\u{FE90}");
    }

    #[test]
    fn latin_passes_through() {
        assert_eq!(reshape("LDL 120"), "LDL 120");
    }

    #[test]
    fn ltr_text_is_not_reordered() {
        assert_eq!(visual_order("Normal Range: 4-6"), "Normal Range: 4-6");
    }

    #[test]
    fn rtl_text_is_reversed() {
        let visual = visual_order("\u{FE91}\u{FE90}");
        assert_eq!(visual, "\u{FE90}\u{FE91}");
    }

    #[test]
    fn numbers_inside_rtl_keep_their_order() {
        let visual = visual_order("نسبة 120 عالية");
        assert!(visual.contains("120"), "{visual}");
        assert!(visual.starts_with("ةيلاع"), "{visual}");
    }

    #[test]
    fn brackets_are_mirrored_in_rtl_runs() {
        let visual = visual_order("فيتامين (د)");
        assert!(visual.starts_with("(د)"), "{visual}");
    }
}
