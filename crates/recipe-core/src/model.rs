//! Domain records and the validation rules applied before anything is
//! written to the store.

use crate::{RecipeError, Result};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const EMAIL_MAX_LEN: usize = 255;
pub const USER_NAME_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const TITLE_MAX_LEN: usize = 90;
pub const DESCRIPTION_MAX_LEN: usize = 512;
pub const LINK_MAX_LEN: usize = 255;
pub const LABEL_MAX_LEN: usize = 255;
/// Largest accepted preparation time, matching a signed 32-bit column.
pub const TIME_MINUTES_MAX: u32 = i32::MAX as u32;

// ---------- Users ----------

/// A user account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lowercases the domain part of an email address, leaving the local part
/// untouched. Input without an `@` is returned trimmed.
pub fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

/// Normalizes and checks an email address, returning the stored form.
pub fn validate_email(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(RecipeError::validation(
            "email",
            "User must have an email address",
        ));
    }
    let email = normalize_email(raw);
    if email.chars().count() > EMAIL_MAX_LEN {
        return Err(RecipeError::validation(
            "email",
            format!("Ensure this field has no more than {} characters.", EMAIL_MAX_LEN),
        ));
    }
    let well_formed = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.contains(char::is_whitespace)
                && (domain == "localhost"
                    || (domain.contains('.')
                        && !domain.starts_with('.')
                        && !domain.ends_with('.')
                        && !domain.contains("..")))
        }
        None => false,
    };
    if !well_formed {
        return Err(RecipeError::validation("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(RecipeError::validation(
            "password",
            format!("Ensure this field has at least {} characters.", PASSWORD_MIN_LEN),
        ));
    }
    Ok(())
}

impl NewUser {
    /// Checks every field and returns a copy with the email normalized.
    pub fn validated(&self) -> Result<NewUser> {
        let email = validate_email(&self.email)?;
        let name = check_len("name", self.name.trim(), USER_NAME_MAX_LEN, false)?;
        validate_password(&self.password)?;
        Ok(NewUser {
            email,
            name,
            password: self.password.clone(),
        })
    }
}

impl UserPatch {
    pub fn validated(&self) -> Result<UserPatch> {
        let email = self.email.as_deref().map(validate_email).transpose()?;
        let name = self
            .name
            .as_deref()
            .map(|n| check_len("name", n.trim(), USER_NAME_MAX_LEN, false))
            .transpose()?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(UserPatch {
            email,
            name,
            password: self.password.clone(),
        })
    }
}

// ---------- Price ----------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("A valid number is required.")]
    Invalid,
    #[error("Ensure that there are no more than 2 decimal places.")]
    TooManyDecimals,
    #[error("Ensure that there are no more than 3 digits before the decimal point.")]
    TooManyDigits,
}

/// Fixed-point price with two decimal places and at most five digits,
/// held as whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(i64);

impl Price {
    pub const MAX_CENTS: i64 = 99_999;

    pub fn from_cents(cents: i64) -> std::result::Result<Self, PriceError> {
        if cents.unsigned_abs() > Self::MAX_CENTS as u64 {
            return Err(PriceError::TooManyDigits);
        }
        Ok(Price(cents))
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if (whole.is_empty() && frac.is_empty())
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(PriceError::Invalid);
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > 2 {
            return Err(PriceError::TooManyDecimals);
        }
        let whole = whole.trim_start_matches('0');
        if whole.len() > 3 {
            return Err(PriceError::TooManyDigits);
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| PriceError::Invalid)?
        };
        let frac_value: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| PriceError::Invalid)? * 10,
            _ => frac.parse().map_err(|_| PriceError::Invalid)?,
        };
        let cents = whole_value * 100 + frac_value;
        Price::from_cents(if negative { -cents } else { cents })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PriceVisitor;

        impl de::Visitor<'_> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal number or numeric string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Price, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Price, E> {
                v.checked_mul(100)
                    .ok_or(PriceError::TooManyDigits)
                    .and_then(Price::from_cents)
                    .map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Price, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(PriceError::TooManyDigits))?;
                self.visit_i64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Price, E> {
                if !v.is_finite() {
                    return Err(E::custom(PriceError::Invalid));
                }
                v.to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}

// ---------- Recipes ----------

/// A named, user-owned label attached to recipes: either a tag or an
/// ingredient. Both share one shape and one set of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

pub type Tag = Label;
pub type Ingredient = Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn noun(self) -> &'static str {
        match self {
            LabelKind::Tag => "Tag",
            LabelKind::Ingredient => "Ingredient",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    pub(crate) fn link_table(self) -> &'static str {
        match self {
            LabelKind::Tag => "recipe_tags",
            LabelKind::Ingredient => "recipe_ingredients",
        }
    }

    pub(crate) fn link_column(self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Ingredient => "ingredient_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub time_minutes: u32,
    pub price: Price,
    pub link: String,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
}

/// Writable recipe fields. `None` means "not supplied". For `tags` and
/// `ingredients`, `Some(vec![])` clears the links while `None` keeps them.
#[derive(Debug, Clone, Default)]
pub struct RecipeInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<u32>,
    pub price: Option<Price>,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeInput {
    /// Trims and checks the input. Without `partial`, title, time and price
    /// are mandatory.
    pub fn validated(&self, partial: bool) -> Result<RecipeInput> {
        if !partial {
            if self.title.is_none() {
                return Err(required("title"));
            }
            if self.time_minutes.is_none() {
                return Err(required("time_minutes"));
            }
            if self.price.is_none() {
                return Err(required("price"));
            }
        }

        if let Some(minutes) = self.time_minutes {
            if minutes > TIME_MINUTES_MAX {
                return Err(RecipeError::validation(
                    "time_minutes",
                    format!(
                        "Ensure this value is less than or equal to {}.",
                        TIME_MINUTES_MAX
                    ),
                ));
            }
        }

        let title = self
            .title
            .as_deref()
            .map(|t| check_len("title", t.trim(), TITLE_MAX_LEN, true))
            .transpose()?;
        let description = self
            .description
            .as_deref()
            .map(|d| check_len("description", d.trim(), DESCRIPTION_MAX_LEN, false))
            .transpose()?;
        let link = self
            .link
            .as_deref()
            .map(|l| check_len("link", l.trim(), LINK_MAX_LEN, false))
            .transpose()?;
        let tags = self
            .tags
            .as_deref()
            .map(|names| validate_names("tags", names))
            .transpose()?;
        let ingredients = self
            .ingredients
            .as_deref()
            .map(|names| validate_names("ingredients", names))
            .transpose()?;

        Ok(RecipeInput {
            title,
            description,
            time_minutes: self.time_minutes,
            price: self.price,
            link,
            tags,
            ingredients,
        })
    }
}

/// Restricts a recipe listing to recipes carrying any of the given tag ids
/// and any of the given ingredient ids. Empty lists do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

/// Parses a comma separated id list such as `1,2,3`.
pub fn parse_id_list(field: &str, raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                RecipeError::validation(field, format!("'{}' is not a valid id.", s))
            })
        })
        .collect()
}

/// Validates a tag or ingredient name, returning it trimmed.
pub fn validate_label(field: &str, name: &str) -> Result<String> {
    check_len(field, name.trim(), LABEL_MAX_LEN, true)
}

fn validate_names(field: &str, names: &[String]) -> Result<Vec<String>> {
    names.iter().map(|n| validate_label(field, n)).collect()
}

fn required(field: &str) -> RecipeError {
    RecipeError::validation(field, "This field is required.")
}

fn check_len(field: &str, value: &str, max: usize, non_blank: bool) -> Result<String> {
    if non_blank && value.is_empty() {
        return Err(RecipeError::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > max {
        return Err(RecipeError::validation(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: RecipeError) -> String {
        match err {
            RecipeError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_new_user_email_normalized() {
        let samples = [
            ("test1@EXAMPLE.com", "test1@example.com"),
            ("Test2@Example.com", "Test2@example.com"),
            ("Test3@EXAMPLE.COM", "Test3@example.com"),
            ("Test4@example.COM", "Test4@example.com"),
        ];
        for (raw, expected) in samples {
            assert_eq!(normalize_email(raw), expected);
        }
    }

    #[test]
    fn test_time_minutes_capped_at_i32_max() {
        let mut input = RecipeInput {
            title: Some("Slow roast".into()),
            time_minutes: Some(3_000_000_000),
            price: Some(Price::from_cents(500).unwrap()),
            ..Default::default()
        };
        let err = input.validated(false).unwrap_err();
        assert_eq!(field_of(err), "time_minutes");

        input.time_minutes = Some(TIME_MINUTES_MAX);
        assert!(input.validated(false).is_ok());
        input.time_minutes = Some(TIME_MINUTES_MAX + 1);
        assert!(input.validated(true).is_err());
    }

    #[test]
    fn test_empty_email_rejected() {
        let user = NewUser {
            email: "".into(),
            name: "".into(),
            password: "test1234".into(),
        };
        let err = user.validated().unwrap_err();
        assert!(err.to_string().contains("User must have an email address"));
    }

    #[test]
    fn test_malformed_emails_rejected() {
        for bad in ["plainaddress", "@example.com", "user@", "user@example", "us er@example.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
        assert!(validate_email("user@localhost").is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let user = NewUser {
            email: "test@example.com".into(),
            name: "Test".into(),
            password: "pass".into(),
        };
        assert_eq!(field_of(user.validated().unwrap_err()), "password");
    }

    #[test]
    fn test_price_parsing() {
        assert_eq!("10.50".parse::<Price>().unwrap().cents(), 1050);
        assert_eq!("5.5".parse::<Price>().unwrap().cents(), 550);
        assert_eq!("25".parse::<Price>().unwrap().cents(), 2500);
        assert_eq!(".75".parse::<Price>().unwrap().cents(), 75);
        assert_eq!("-1.25".parse::<Price>().unwrap().cents(), -125);
        assert_eq!("999.99".parse::<Price>().unwrap().cents(), 99_999);
        assert_eq!("1.500".parse::<Price>().unwrap().cents(), 150);
        assert_eq!("1.555".parse::<Price>(), Err(PriceError::TooManyDecimals));
        assert_eq!("1000".parse::<Price>(), Err(PriceError::TooManyDigits));
        assert_eq!("abc".parse::<Price>(), Err(PriceError::Invalid));
        assert_eq!(".".parse::<Price>(), Err(PriceError::Invalid));
    }

    #[test]
    fn test_price_display_and_serde() {
        let price: Price = "5.5".parse().unwrap();
        assert_eq!(price.to_string(), "5.50");
        assert_eq!(Price::from_cents(-5).unwrap().to_string(), "-0.05");
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"5.50\"");

        let from_number: Price = serde_json::from_str("20.5").unwrap();
        assert_eq!(from_number.cents(), 2050);
        let from_int: Price = serde_json::from_str("45").unwrap();
        assert_eq!(from_int.cents(), 4500);
        assert!(serde_json::from_str::<Price>("1234.5").is_err());
    }

    #[test]
    fn test_recipe_input_required_fields() {
        let input = RecipeInput {
            title: Some("Soup".into()),
            ..Default::default()
        };
        assert_eq!(field_of(input.validated(false).unwrap_err()), "time_minutes");
        assert!(input.validated(true).is_ok());
    }

    #[test]
    fn test_recipe_input_trims_and_limits() {
        let input = RecipeInput {
            title: Some("  Soup  ".into()),
            time_minutes: Some(10),
            price: Some(Price::from_cents(100).unwrap()),
            tags: Some(vec![" Dinner ".into()]),
            ..Default::default()
        };
        let validated = input.validated(false).unwrap();
        assert_eq!(validated.title.as_deref(), Some("Soup"));
        assert_eq!(validated.tags, Some(vec!["Dinner".to_string()]));

        let too_long = RecipeInput {
            title: Some("x".repeat(TITLE_MAX_LEN + 1)),
            ..Default::default()
        };
        assert_eq!(field_of(too_long.validated(true).unwrap_err()), "title");

        let blank_tag = RecipeInput {
            tags: Some(vec!["   ".into()]),
            ..Default::default()
        };
        assert_eq!(field_of(blank_tag.validated(true).unwrap_err()), "tags");
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("tags", "1,2, 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("tags", "").unwrap(), Vec::<i64>::new());
        assert!(parse_id_list("tags", "1,x").is_err());
    }
}
