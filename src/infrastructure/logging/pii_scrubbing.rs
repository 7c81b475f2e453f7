use regex::{Captures, Regex};
use std::fmt;

use crate::domain::errors::DomainResult;

/// Strips personal data from user utterances before they are stored or logged.
///
/// Digit runs are classified by shape rather than matched with word
/// boundaries, so numbers glued to CJK text are still caught.
#[derive(Clone)]
pub struct PiiScrubber {
    email_pattern: Regex,
    digit_run_pattern: Regex,
}

impl PiiScrubber {
    /// # Errors
    /// Returns an error if a pattern fails to compile
    pub fn new() -> DomainResult<Self> {
        Ok(Self {
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            digit_run_pattern: Regex::new(r"[0-9]+[Xx]?")?,
        })
    }

    /// Scrub a message of personal data
    pub fn scrub(&self, message: &str) -> String {
        let scrubbed = self.email_pattern.replace_all(message, "[EMAIL_REDACTED]");
        self.digit_run_pattern
            .replace_all(&scrubbed, |caps: &Captures| classify_digit_run(&caps[0]))
            .into_owned()
    }

    /// Whether `message` would be changed by [`Self::scrub`].
    pub fn contains_pii(&self, message: &str) -> bool {
        self.scrub(message) != message
    }
}

fn classify_digit_run(run: &str) -> String {
    let (digits, has_check_letter) = run
        .strip_suffix(['X', 'x'])
        .map_or((run, false), |digits| (digits, true));

    match (digits.len(), has_check_letter) {
        (17, true) | (18, false) => "[ID_REDACTED]".to_string(),
        (15 | 16 | 19, false) => "[CARD_REDACTED]".to_string(),
        (11, false) if is_mobile_number(digits) => "[PHONE_REDACTED]".to_string(),
        _ => run.to_string(),
    }
}

fn is_mobile_number(run: &str) -> bool {
    let bytes = run.as_bytes();
    bytes.first() == Some(&b'1') && bytes.get(1).is_some_and(|b| (b'3'..=b'9').contains(b))
}

impl fmt::Debug for PiiScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiiScrubber").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrubber() -> PiiScrubber {
        PiiScrubber::new().unwrap()
    }

    #[test]
    fn test_scrub_mobile_number_next_to_cjk() {
        let scrubbed = scrubber().scrub("我的电话13812345678请联系");
        assert!(!scrubbed.contains("13812345678"));
        assert!(scrubbed.contains("[PHONE_REDACTED]"));
    }

    #[test]
    fn test_scrub_email() {
        let scrubbed = scrubber().scrub("mail me at li.wei@example.com tonight");
        assert_eq!(scrubbed, "mail me at [EMAIL_REDACTED] tonight");
    }

    #[test]
    fn test_scrub_national_id() {
        let scrubber = scrubber();
        assert!(scrubber.scrub("id 11010519491231002X").contains("[ID_REDACTED]"));
        assert!(scrubber.scrub("id 110105194912310021").contains("[ID_REDACTED]"));
    }

    #[test]
    fn test_scrub_card_number() {
        let scrubbed = scrubber().scrub("card 6222021234567890 please");
        assert!(scrubbed.contains("[CARD_REDACTED]"));
    }

    #[test]
    fn test_no_scrubbing_needed() {
        let scrubber = scrubber();
        let message = "dinner for 4 under 300 yuan before 19:30";
        assert_eq!(scrubber.scrub(message), message);
        assert!(!scrubber.contains_pii(message));
        // 11 digits that are not a mobile number stay
        assert_eq!(scrubber.scrub("ref 10000000000"), "ref 10000000000");
    }
}
