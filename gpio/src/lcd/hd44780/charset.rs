//! Character set translation for the HD44780 character generator ROM.
//!
//! The controller's ROM is ASCII-compatible in its lower half. What sits above `0x7F` depends on
//! the ROM code the module was made with; [Charset] selects how characters outside ASCII are
//! looked up.

/// How characters are translated to controller codes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Charset {
    /// Characters up to `U+00FF` are sent as their code point.
    #[default]
    Native,
    /// Cyrillic letters are looked up in [CYRILLIC], for modules with the Cyrillic ROM.
    /// Everything else is sent as with [Charset::Native].
    Cyrillic,
}

impl Charset {
    /// Gets the controller code for a character, or `None` if the controller can't show it.
    pub fn encode(&self, ch: char) -> Option<u8> {
        match self {
            Charset::Native => u8::try_from(ch).ok(),
            Charset::Cyrillic => remap_cyrillic(ch).or_else(|| u8::try_from(ch).ok()),
        }
    }
}

/// Looks a Cyrillic letter up in [CYRILLIC].
pub fn remap_cyrillic(ch: char) -> Option<u8> {
    CYRILLIC
        .iter()
        .find(|&&(letter, _)| letter == ch)
        .map(|&(_, code)| code)
}

/// Cyrillic letters and their codes in the Cyrillic character generator ROM.
///
/// Letters that look the same as a Latin one use the Latin glyph.
pub const CYRILLIC: [(char, u8); 66] = [
    ('а', 97),
    ('б', 178),
    ('в', 179),
    ('г', 180),
    ('д', 227),
    ('е', 101),
    ('ё', 181),
    ('ж', 182),
    ('з', 183),
    ('и', 184),
    ('й', 185),
    ('к', 186),
    ('л', 187),
    ('м', 188),
    ('н', 189),
    ('о', 111),
    ('п', 190),
    ('р', 112),
    ('с', 99),
    ('т', 191),
    ('у', 121),
    ('ф', 228),
    ('х', 120),
    ('ч', 192),
    ('ц', 229),
    ('ш', 193),
    ('щ', 230),
    ('ъ', 194),
    ('ы', 195),
    ('ь', 196),
    ('э', 197),
    ('ю', 198),
    ('я', 199),
    ('А', 65),
    ('Б', 160),
    ('В', 66),
    ('Г', 161),
    ('Д', 224),
    ('Е', 69),
    ('Ё', 162),
    ('Ж', 163),
    ('З', 164),
    ('И', 165),
    ('Й', 166),
    ('К', 75),
    ('Л', 167),
    ('М', 77),
    ('Н', 72),
    ('О', 79),
    ('П', 168),
    ('Р', 80),
    ('С', 67),
    ('Т', 84),
    ('У', 169),
    ('Ф', 170),
    ('Х', 88),
    ('Ч', 171),
    ('Ц', 225),
    ('Ш', 171),
    ('Щ', 226),
    ('Ъ', 172),
    ('Ы', 173),
    ('Ь', 98),
    ('Э', 174),
    ('Ю', 176),
    ('Я', 177),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_passes_latin1_through() {
        assert_eq!(Charset::Native.encode('A'), Some(b'A'));
        assert_eq!(Charset::Native.encode('\u{E9}'), Some(0xE9));
        assert_eq!(Charset::Native.encode('ж'), None);
    }

    #[test]
    fn cyrillic_remaps_letters() {
        assert_eq!(Charset::Cyrillic.encode('ж'), Some(182));
        assert_eq!(Charset::Cyrillic.encode('Я'), Some(177));
        assert_eq!(Charset::Cyrillic.encode('о'), Some(b'o'));
        assert_eq!(Charset::Cyrillic.encode('Z'), Some(b'Z'));
        assert_eq!(Charset::Cyrillic.encode('€'), None);
    }

    #[test]
    fn table_has_no_duplicate_letters() {
        for (i, (letter, _)) in CYRILLIC.iter().enumerate() {
            assert!(
                CYRILLIC[i + 1..].iter().all(|(other, _)| other != letter),
                "{} listed twice",
                letter
            );
        }
    }
}
