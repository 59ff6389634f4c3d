//! Validation engine.
//!
//! Pure functions that classify one token against the type expected at a
//! node. Accepted values are returned in canonical form (trimmed and
//! title-cased names, ISO dates, international phone digits).

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use ussd_core::config::ValidationConfig;
use ussd_core::error::UssdError;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    InvalidChoice,
    InvalidFormat,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::InvalidChoice => "invalid-choice",
            RejectReason::InvalidFormat => "invalid-format",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// Short operator-facing explanation; never shown verbatim to callers.
    pub detail: String,
}

impl Rejection {
    pub fn choice(detail: impl Into<String>) -> Self {
        Self {
            reason: RejectReason::InvalidChoice,
            detail: detail.into(),
        }
    }

    pub fn format(detail: impl Into<String>) -> Self {
        Self {
            reason: RejectReason::InvalidFormat,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted(String),
    Rejected(Rejection),
}

/// Validator bound to a free-text capture node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorTag {
    Name,
    NationalId,
    DateOfBirth,
    MembershipNumber,
}

/// Mobile network operator derived from the subscriber prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Airtel,
    Mtn,
    Zamtel,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Airtel => "airtel",
            Operator::Mtn => "mtn",
            Operator::Zamtel => "zamtel",
        }
    }
}

/// Compiled validators for one deployment.
#[derive(Debug, Clone)]
pub struct Validator {
    national_id: Regex,
    membership_number: Regex,
    min_age: u32,
    max_age: u32,
    name_max_len: usize,
    country_code: String,
    subscriber_digits: usize,
    mobile_prefixes: Vec<String>,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Result<Self, UssdError> {
        let national_id = Regex::new(&config.national_id_pattern)
            .map_err(|e| UssdError::Config(format!("Bad national_id_pattern: {}", e)))?;
        let membership_number = Regex::new(&config.membership_number_pattern)
            .map_err(|e| UssdError::Config(format!("Bad membership_number_pattern: {}", e)))?;

        Ok(Self {
            national_id,
            membership_number,
            min_age: config.min_age,
            max_age: config.max_age,
            name_max_len: config.name_max_len,
            country_code: config.phone_country_code.clone(),
            subscriber_digits: config.phone_subscriber_digits,
            mobile_prefixes: config.mobile_prefixes.clone(),
        })
    }

    /// Classify `token` with the validator named by `tag`.
    pub fn validate(&self, tag: ValidatorTag, token: &str, today: NaiveDate) -> ValidationResult {
        match tag {
            ValidatorTag::Name => self.name(token),
            ValidatorTag::NationalId => self.national_id(token),
            ValidatorTag::DateOfBirth => self.date_of_birth(token, today),
            ValidatorTag::MembershipNumber => self.membership_number(token),
        }
    }

    pub fn name(&self, token: &str) -> ValidationResult {
        let collapsed = token.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return ValidationResult::Rejected(Rejection::format("name is empty"));
        }
        if collapsed.chars().count() > self.name_max_len {
            return ValidationResult::Rejected(Rejection::format(format!(
                "name longer than {} characters",
                self.name_max_len
            )));
        }
        if collapsed.chars().any(|c| c.is_control()) {
            return ValidationResult::Rejected(Rejection::format("name has control characters"));
        }
        if collapsed.chars().all(|c| c.is_ascii_digit() || c == ' ') {
            return ValidationResult::Rejected(Rejection::format("name is digits only"));
        }
        ValidationResult::Accepted(title_case(&collapsed))
    }

    pub fn national_id(&self, token: &str) -> ValidationResult {
        let trimmed = token.trim();
        if self.national_id.is_match(trimmed) {
            ValidationResult::Accepted(trimmed.to_string())
        } else {
            ValidationResult::Rejected(Rejection::format(format!(
                "national ID '{}' does not match {}",
                trimmed,
                self.national_id.as_str()
            )))
        }
    }

    /// Day/month/year date with an age inside `[min_age, max_age]`.
    pub fn date_of_birth(&self, token: &str, today: NaiveDate) -> ValidationResult {
        let trimmed = token.trim();
        let dob = match NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
            Ok(d) => d,
            Err(_) => {
                return ValidationResult::Rejected(Rejection::format(format!(
                    "'{}' is not a DD/MM/YYYY date",
                    trimmed
                )))
            }
        };
        if dob > today {
            return ValidationResult::Rejected(Rejection::format("date of birth is in the future"));
        }
        let age = age_on(dob, today);
        if age < self.min_age {
            return ValidationResult::Rejected(Rejection::format(format!(
                "age {} is below {}",
                age, self.min_age
            )));
        }
        if age > self.max_age {
            return ValidationResult::Rejected(Rejection::format(format!(
                "age {} is above {}",
                age, self.max_age
            )));
        }
        ValidationResult::Accepted(dob.format("%Y-%m-%d").to_string())
    }

    /// National mobile number, normalised to international digits.
    pub fn phone(&self, token: &str) -> ValidationResult {
        let digits: String = token
            .trim()
            .trim_start_matches('+')
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return ValidationResult::Rejected(Rejection::format("phone has non-digit characters"));
        }

        let n = self.subscriber_digits;
        let subscriber = if digits.len() == self.country_code.len() + n
            && digits.starts_with(&self.country_code)
        {
            &digits[self.country_code.len()..]
        } else if digits.len() == n + 1 && digits.starts_with('0') {
            &digits[1..]
        } else if digits.len() == n {
            digits.as_str()
        } else {
            return ValidationResult::Rejected(Rejection::format(format!(
                "phone has {} digits",
                digits.len()
            )));
        };

        if !self.mobile_prefixes.iter().any(|p| subscriber.starts_with(p.as_str())) {
            return ValidationResult::Rejected(Rejection::format(format!(
                "unknown mobile prefix in {}",
                subscriber
            )));
        }
        ValidationResult::Accepted(format!("{}{}", self.country_code, subscriber))
    }

    pub fn membership_number(&self, token: &str) -> ValidationResult {
        let normalised = token.trim().to_uppercase();
        if self.membership_number.is_match(&normalised) {
            ValidationResult::Accepted(normalised)
        } else {
            ValidationResult::Rejected(Rejection::format(format!(
                "'{}' is not a membership number",
                normalised
            )))
        }
    }

    /// Operator for a phone already accepted by [`Validator::phone`].
    pub fn operator(&self, normalised: &str) -> Option<Operator> {
        let subscriber = normalised.strip_prefix(self.country_code.as_str())?;
        match subscriber.get(..2)? {
            "96" | "97" => Some(Operator::Airtel),
            "76" | "77" => Some(Operator::Mtn),
            "95" | "75" | "98" => Some(Operator::Zamtel),
            _ => None,
        }
    }
}

/// Match a menu token against declared choice keys.
///
/// Comparison is exact unless the node declares case-insensitive keys.
/// The accepted value is the declared key.
pub fn choice<'a>(
    token: &str,
    keys: impl IntoIterator<Item = &'a str>,
    case_insensitive: bool,
) -> ValidationResult {
    let found = keys.into_iter().find(|key| {
        if case_insensitive {
            key.eq_ignore_ascii_case(token)
        } else {
            *key == token
        }
    });
    match found {
        Some(key) => ValidationResult::Accepted(key.to_string()),
        None => ValidationResult::Rejected(Rejection::choice(format!("no option '{}'", token))),
    }
}

/// Completed years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = matches!(c, ' ' | '-' | '\'');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(&ValidationConfig::default()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    impl ValidationResult {
        fn is_accepted(&self) -> bool {
            matches!(self, ValidationResult::Accepted(_))
        }
    }

    fn accepted(r: ValidationResult) -> String {
        match r {
            ValidationResult::Accepted(v) => v,
            ValidationResult::Rejected(rej) => panic!("rejected: {:?}", rej),
        }
    }

    fn rejected(r: ValidationResult) -> Rejection {
        match r {
            ValidationResult::Rejected(rej) => rej,
            ValidationResult::Accepted(v) => panic!("accepted: {}", v),
        }
    }

    // =====================================================================
    // Names
    // =====================================================================

    #[test]
    fn test_name_normalised() {
        let v = validator();
        assert_eq!(accepted(v.name("  dennis ")), "Dennis");
        assert_eq!(accepted(v.name("mary-JANE  o'neil")), "Mary-Jane O'Neil");
    }

    #[test]
    fn test_name_rejections() {
        let v = validator();
        assert_eq!(rejected(v.name("   ")).reason, RejectReason::InvalidFormat);
        assert!(!v.name("12345").is_accepted());
        assert!(!v.name(&"a".repeat(41)).is_accepted());
        assert!(!v.name("Den\u{7}nis").is_accepted());
        assert!(v.name(&"a".repeat(40)).is_accepted());
    }

    // =====================================================================
    // National ID
    // =====================================================================

    #[test]
    fn test_national_id() {
        let v = validator();
        assert_eq!(accepted(v.national_id(" 123456/78/1 ")), "123456/78/1");
        for bad in ["1234567", "123456/78/12", "12345/78/1", "123456-78-1", "abcdef/gh/i"] {
            assert_eq!(rejected(v.national_id(bad)).reason, RejectReason::InvalidFormat);
        }
    }

    #[test]
    fn test_national_id_pattern_is_configurable() {
        let config = ValidationConfig {
            national_id_pattern: r"^\d{9}$".to_string(),
            ..ValidationConfig::default()
        };
        let v = Validator::new(&config).unwrap();
        assert!(v.national_id("123456789").is_accepted());
        assert!(!v.national_id("123456/78/1").is_accepted());
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let config = ValidationConfig {
            national_id_pattern: "([".to_string(),
            ..ValidationConfig::default()
        };
        assert!(matches!(Validator::new(&config), Err(UssdError::Config(_))));
    }

    // =====================================================================
    // Date of birth
    // =====================================================================

    #[test]
    fn test_date_of_birth_accepted_as_iso() {
        let v = validator();
        assert_eq!(accepted(v.date_of_birth("01/01/1990", today())), "1990-01-01");
    }

    #[test]
    fn test_date_of_birth_rejections() {
        let v = validator();
        assert!(!v.date_of_birth("31/02/1990", today()).is_accepted());
        assert!(!v.date_of_birth("1990-01-01", today()).is_accepted());
        assert!(!v.date_of_birth("01/01/2030", today()).is_accepted());
        assert!(!v.date_of_birth("01/01/1850", today()).is_accepted());
    }

    #[test]
    fn test_date_of_birth_minimum_age_boundary() {
        let v = validator();
        // Eighteenth birthday today.
        assert!(v.date_of_birth("15/06/2006", today()).is_accepted());
        // Eighteenth birthday tomorrow.
        assert!(!v.date_of_birth("16/06/2006", today()).is_accepted());
    }

    #[test]
    fn test_age_on() {
        let dob = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()), 23);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()), 24);
    }

    // =====================================================================
    // Phone
    // =====================================================================

    #[test]
    fn test_phone_forms_normalise() {
        let v = validator();
        for form in ["260971234567", "+260971234567", "0971234567", "971234567", "097 123 4567"] {
            assert_eq!(accepted(v.phone(form)), "260971234567", "form {}", form);
        }
    }

    #[test]
    fn test_phone_rejections() {
        let v = validator();
        assert!(!v.phone("260911234567").is_accepted());
        assert!(!v.phone("09712345").is_accepted());
        assert!(!v.phone("0971abc567").is_accepted());
        assert!(!v.phone("").is_accepted());
        assert!(!v.phone("254712345678").is_accepted());
    }

    #[test]
    fn test_operator_from_prefix() {
        let v = validator();
        assert_eq!(v.operator("260971234567"), Some(Operator::Airtel));
        assert_eq!(v.operator("260761234567"), Some(Operator::Mtn));
        assert_eq!(v.operator("260951234567"), Some(Operator::Zamtel));
        assert_eq!(v.operator("260981234567").map(|o| o.as_str()), Some("zamtel"));
        assert_eq!(v.operator("254712345678"), None);
    }

    // =====================================================================
    // Membership number and choices
    // =====================================================================

    #[test]
    fn test_membership_number_uppercased() {
        let v = validator();
        assert_eq!(accepted(v.membership_number(" pm12345678")), "PM12345678");
        assert!(!v.membership_number("12345678").is_accepted());
        assert!(!v.membership_number("PM12").is_accepted());
    }

    #[test]
    fn test_choice_exact_by_default() {
        assert_eq!(accepted(choice("1", ["1", "2", "0"], false)), "1");
        let rej = rejected(choice("9", ["1", "2", "0"], false));
        assert_eq!(rej.reason, RejectReason::InvalidChoice);
        assert!(!choice("y", ["Y", "N"], false).is_accepted());
        assert!(!choice(" 1", ["1"], false).is_accepted());
    }

    #[test]
    fn test_choice_case_insensitive_when_declared() {
        assert_eq!(accepted(choice("y", ["Y", "N"], true)), "Y");
    }

    #[test]
    fn test_validate_dispatches_by_tag() {
        let v = validator();
        assert!(v.validate(ValidatorTag::NationalId, "123456/78/1", today()).is_accepted());
        assert!(!v.validate(ValidatorTag::Name, "42", today()).is_accepted());
    }
}
