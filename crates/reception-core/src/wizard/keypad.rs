/// Digit buffer behind the on-screen numeric keypad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keypad {
    digits: String,
    max_digits: usize,
}

impl Keypad {
    pub fn new(max_digits: usize) -> Self {
        Self {
            digits: String::new(),
            max_digits,
        }
    }

    pub fn with_value(value: &str, max_digits: usize) -> Self {
        let mut keypad = Self::new(max_digits);
        for c in value.chars() {
            keypad.press(c);
        }
        keypad
    }

    /// Append a digit. Non-digits and presses past the limit are ignored.
    pub fn press(&mut self, c: char) -> bool {
        if !c.is_ascii_digit() || self.digits.len() >= self.max_digits {
            return false;
        }
        self.digits.push(c);
        true
    }

    pub fn backspace(&mut self) {
        self.digits.pop();
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn value(&self) -> &str {
        &self.digits
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Parsed positive value, if the buffer holds one.
    pub fn positive(&self) -> Option<u32> {
        self.digits.parse::<u32>().ok().filter(|n| *n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_respects_limit() {
        let mut keypad = Keypad::new(2);
        assert!(keypad.press('1'));
        assert!(keypad.press('2'));
        assert!(!keypad.press('3'));
        assert_eq!(keypad.value(), "12");
    }

    #[test]
    fn test_rejects_non_digits() {
        let mut keypad = Keypad::new(3);
        assert!(!keypad.press('a'));
        assert!(!keypad.press('-'));
        assert!(keypad.is_empty());
    }

    #[test]
    fn test_backspace_and_clear() {
        let mut keypad = Keypad::with_value("123", 3);
        keypad.backspace();
        assert_eq!(keypad.value(), "12");
        keypad.clear();
        assert!(keypad.is_empty());
        keypad.backspace();
        assert!(keypad.is_empty());
    }

    #[test]
    fn test_positive() {
        assert_eq!(Keypad::with_value("007", 3).positive(), Some(7));
        assert_eq!(Keypad::with_value("0", 3).positive(), None);
        assert_eq!(Keypad::with_value("00", 3).positive(), None);
        assert_eq!(Keypad::new(3).positive(), None);
    }
}
