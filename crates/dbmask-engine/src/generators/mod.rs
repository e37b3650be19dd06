//! Value generators.
//!
//! A column rule's `(MaskingType, SubType)` pair is parsed once into a
//! [`GeneratorKind`]; [`ColumnGenerator`] pairs the kind with the column's
//! [`Constraints`] and produces values already coerced to the column type.

use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use rand_regex::Regex as RandRegex;

use dbmask_config::{Bound, GeneratedRule};
use dbmask_core::{SqlType, SqlValue, TypeFamily};

use crate::errors::GenerationError;

pub mod commerce;
pub mod date;
pub mod locales;
pub mod random;
pub mod semantic;
pub mod shuffle;

pub use locales::LocaleKey;

/// Alphabet used when a rule does not set `CharacterString`.
pub const DEFAULT_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
/// Length used by random strings when neither `MaxValue` nor a declared length applies.
pub const DEFAULT_STRING_LENGTH: usize = 10;
const REGEX_MAX_REPEAT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomKind {
    Number,
    Decimal,
    Bool,
    Byte,
    String,
    Hexadecimal,
    Guid,
    Regex,
    Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    Past,
    Future,
    Recent,
    Soon,
    Between,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    FirstName,
    LastName,
    FullName,
    Prefix,
    Suffix,
    JobTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    City,
    Country,
    CountryCode,
    StreetAddress,
    StreetName,
    State,
    StateAbbr,
    ZipCode,
    BuildingNumber,
    SecondaryAddress,
    FullAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternetKind {
    Email,
    SafeEmail,
    UserName,
    Password,
    IPv4,
    IPv6,
    Mac,
    DomainSuffix,
    Url,
    UserAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneKind {
    PhoneNumber,
    CellNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyKind {
    CompanyName,
    Suffix,
    Industry,
    CatchPhrase,
    Bs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommerceKind {
    Department,
    ProductName,
    Product,
    ProductAdjective,
    ProductMaterial,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceKind {
    Account,
    CreditCardNumber,
    Bic,
    Isin,
    CurrencyCode,
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoremKind {
    Word,
    Words,
    Sentence,
    Paragraph,
    Text,
}

/// Parsed `(MaskingType, SubType)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Random(RandomKind),
    Date(DateKind),
    Name(NameKind),
    Address(AddressKind),
    Internet(InternetKind),
    Phone(PhoneKind),
    Company(CompanyKind),
    Commerce(CommerceKind),
    Finance(FinanceKind),
    Lorem(LoremKind),
    Shuffle,
}

impl GeneratorKind {
    /// Parse case-insensitive masking type and subtype names.
    pub fn parse(masking_type: &str, sub_type: Option<&str>) -> Result<Self, GenerationError> {
        let unsupported = || GenerationError::unsupported(masking_type, sub_type);
        let masking = masking_type.trim().to_lowercase();
        if masking == "shuffle" {
            return Ok(GeneratorKind::Shuffle);
        }
        let sub = sub_type.ok_or_else(unsupported)?.trim().to_lowercase();

        let kind = match masking.as_str() {
            "random" => GeneratorKind::Random(match sub.as_str() {
                "number" | "int" | "integer" => RandomKind::Number,
                "decimal" | "double" | "float" => RandomKind::Decimal,
                "bool" | "boolean" => RandomKind::Bool,
                "byte" => RandomKind::Byte,
                "string" | "alphanumeric" => RandomKind::String,
                "hexadecimal" | "hex" => RandomKind::Hexadecimal,
                "guid" | "uuid" => RandomKind::Guid,
                "regex" => RandomKind::Regex,
                "format" => RandomKind::Format,
                _ => return Err(unsupported()),
            }),
            "date" => GeneratorKind::Date(match sub.as_str() {
                "date" => DateKind::Date,
                "past" => DateKind::Past,
                "future" => DateKind::Future,
                "recent" => DateKind::Recent,
                "soon" => DateKind::Soon,
                "between" => DateKind::Between,
                "time" => DateKind::Time,
                _ => return Err(unsupported()),
            }),
            "name" => GeneratorKind::Name(match sub.as_str() {
                "firstname" => NameKind::FirstName,
                "lastname" => NameKind::LastName,
                "fullname" | "name" => NameKind::FullName,
                "prefix" => NameKind::Prefix,
                "suffix" => NameKind::Suffix,
                "jobtitle" => NameKind::JobTitle,
                _ => return Err(unsupported()),
            }),
            "address" => GeneratorKind::Address(match sub.as_str() {
                "city" => AddressKind::City,
                "country" => AddressKind::Country,
                "countrycode" => AddressKind::CountryCode,
                "streetaddress" => AddressKind::StreetAddress,
                "streetname" => AddressKind::StreetName,
                "state" => AddressKind::State,
                "stateabbr" => AddressKind::StateAbbr,
                "zipcode" => AddressKind::ZipCode,
                "buildingnumber" => AddressKind::BuildingNumber,
                "secondaryaddress" => AddressKind::SecondaryAddress,
                "fulladdress" => AddressKind::FullAddress,
                _ => return Err(unsupported()),
            }),
            "internet" => GeneratorKind::Internet(match sub.as_str() {
                "email" => InternetKind::Email,
                "safeemail" => InternetKind::SafeEmail,
                "username" => InternetKind::UserName,
                "password" => InternetKind::Password,
                "ipv4" | "ip" => InternetKind::IPv4,
                "ipv6" => InternetKind::IPv6,
                "mac" => InternetKind::Mac,
                "domainsuffix" => InternetKind::DomainSuffix,
                "url" => InternetKind::Url,
                "useragent" => InternetKind::UserAgent,
                _ => return Err(unsupported()),
            }),
            "phone" => GeneratorKind::Phone(match sub.as_str() {
                "phonenumber" => PhoneKind::PhoneNumber,
                "cellnumber" => PhoneKind::CellNumber,
                _ => return Err(unsupported()),
            }),
            "company" => GeneratorKind::Company(match sub.as_str() {
                "companyname" => CompanyKind::CompanyName,
                "suffix" => CompanyKind::Suffix,
                "industry" => CompanyKind::Industry,
                "catchphrase" => CompanyKind::CatchPhrase,
                "bs" => CompanyKind::Bs,
                _ => return Err(unsupported()),
            }),
            "commerce" => GeneratorKind::Commerce(match sub.as_str() {
                "department" => CommerceKind::Department,
                "productname" => CommerceKind::ProductName,
                "product" => CommerceKind::Product,
                "productadjective" => CommerceKind::ProductAdjective,
                "productmaterial" => CommerceKind::ProductMaterial,
                "price" => CommerceKind::Price,
                _ => return Err(unsupported()),
            }),
            "finance" => GeneratorKind::Finance(match sub.as_str() {
                "account" => FinanceKind::Account,
                "creditcardnumber" => FinanceKind::CreditCardNumber,
                "bic" => FinanceKind::Bic,
                "isin" => FinanceKind::Isin,
                "currencycode" => FinanceKind::CurrencyCode,
                "amount" => FinanceKind::Amount,
                _ => return Err(unsupported()),
            }),
            "lorem" => GeneratorKind::Lorem(match sub.as_str() {
                "word" => LoremKind::Word,
                "words" => LoremKind::Words,
                "sentence" => LoremKind::Sentence,
                "paragraph" => LoremKind::Paragraph,
                "text" => LoremKind::Text,
                _ => return Err(unsupported()),
            }),
            _ => return Err(unsupported()),
        };
        Ok(kind)
    }

    /// Whether `MinValue`/`MaxValue` bound the value itself rather than its length.
    pub fn bounds_are_values(self) -> bool {
        matches!(
            self,
            GeneratorKind::Random(RandomKind::Number | RandomKind::Decimal | RandomKind::Byte)
                | GeneratorKind::Date(_)
                | GeneratorKind::Commerce(CommerceKind::Price)
                | GeneratorKind::Finance(FinanceKind::Amount)
        )
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Random(kind) => write!(f, "Random/{kind:?}"),
            GeneratorKind::Date(kind) => write!(f, "Date/{kind:?}"),
            GeneratorKind::Name(kind) => write!(f, "Name/{kind:?}"),
            GeneratorKind::Address(kind) => write!(f, "Address/{kind:?}"),
            GeneratorKind::Internet(kind) => write!(f, "Internet/{kind:?}"),
            GeneratorKind::Phone(kind) => write!(f, "Phone/{kind:?}"),
            GeneratorKind::Company(kind) => write!(f, "Company/{kind:?}"),
            GeneratorKind::Commerce(kind) => write!(f, "Commerce/{kind:?}"),
            GeneratorKind::Finance(kind) => write!(f, "Finance/{kind:?}"),
            GeneratorKind::Lorem(kind) => write!(f, "Lorem/{kind:?}"),
            GeneratorKind::Shuffle => f.write_str("Shuffle"),
        }
    }
}

/// Everything a generator needs to know about the target column.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub sql_type: SqlType,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    /// Declared character length; `None` for `max` and non-character types.
    pub declared_length: Option<usize>,
    pub numeric_scale: Option<u32>,
    pub character_string: Option<String>,
    pub format: Option<String>,
    pub separator: Option<String>,
    pub exact_length: bool,
    pub locale: LocaleKey,
    pub today: NaiveDate,
}

impl Constraints {
    pub fn new(sql_type: SqlType, locale: LocaleKey, today: NaiveDate) -> Self {
        Self {
            sql_type,
            min: None,
            max: None,
            declared_length: None,
            numeric_scale: None,
            character_string: None,
            format: None,
            separator: None,
            exact_length: false,
            locale,
            today,
        }
    }

    /// Copy the generator parameters of a column rule.
    pub fn with_rule(mut self, rule: &GeneratedRule) -> Self {
        self.min = rule.min.clone();
        self.max = rule.max.clone();
        self.character_string = rule.character_string.clone();
        self.format = rule.format.clone();
        self.separator = rule.separator.clone();
        self
    }

    pub fn alphabet(&self) -> &str {
        self.character_string
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ALPHABET)
    }

    /// Upper bound on output length in characters.
    pub fn length_cap(&self, kind: GeneratorKind) -> Option<usize> {
        let rule_max = if kind.bounds_are_values() {
            None
        } else {
            self.max
                .as_ref()
                .and_then(Bound::as_i64)
                .and_then(|value| usize::try_from(value).ok())
        };
        match (rule_max, self.declared_length) {
            (Some(rule), Some(declared)) => Some(rule.min(declared)),
            (rule, declared) => rule.or(declared),
        }
    }

    /// Length text is padded to under `exact_length`; never past the cap.
    pub fn exact_target(&self, kind: GeneratorKind) -> Option<usize> {
        if !self.exact_length || self.declared_length.is_none() {
            return None;
        }
        self.length_cap(kind)
    }

    /// Inclusive length range for random strings.
    pub fn string_length_range(&self, kind: GeneratorKind) -> (usize, usize) {
        if let Some(target) = self.exact_target(kind) {
            return (target, target);
        }
        let max = self
            .length_cap(kind)
            .unwrap_or(DEFAULT_STRING_LENGTH)
            .max(1);
        let min = self
            .min
            .as_ref()
            .and_then(Bound::as_i64)
            .and_then(|value| usize::try_from(value).ok())
            .unwrap_or(1)
            .clamp(1, max);
        (min, max)
    }
}

/// Generator bound to one column.
#[derive(Debug)]
pub struct ColumnGenerator {
    kind: GeneratorKind,
    constraints: Constraints,
    pattern: Option<RandRegex>,
}

impl ColumnGenerator {
    /// Parse the rule's generator kind and prepare any pattern it needs.
    pub fn new(rule: &GeneratedRule, constraints: Constraints) -> Result<Self, GenerationError> {
        let kind = GeneratorKind::parse(&rule.masking_type, rule.sub_type.as_deref())?;
        let constraints = constraints.with_rule(rule);
        Self::from_kind(kind, constraints)
    }

    pub fn from_kind(
        kind: GeneratorKind,
        constraints: Constraints,
    ) -> Result<Self, GenerationError> {
        let pattern = match kind {
            GeneratorKind::Random(RandomKind::Regex) => {
                let source = constraints.format.as_deref().ok_or_else(|| {
                    GenerationError::constraint(kind.to_string(), "Format must hold the pattern")
                })?;
                let regex = RandRegex::compile(source, REGEX_MAX_REPEAT).map_err(|err| {
                    GenerationError::constraint(
                        kind.to_string(),
                        format!("invalid regex pattern: {err}"),
                    )
                })?;
                Some(regex)
            }
            GeneratorKind::Random(RandomKind::Format) if constraints.format.is_none() => {
                return Err(GenerationError::constraint(
                    kind.to_string(),
                    "Format must hold the pattern",
                ));
            }
            _ => None,
        };
        Ok(Self {
            kind,
            constraints,
            pattern,
        })
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Produce one value for the column, coerced to its SQL type.
    pub fn generate<R: Rng>(
        &self,
        source: &SqlValue,
        rng: &mut R,
    ) -> Result<SqlValue, GenerationError> {
        let raw = match self.kind {
            GeneratorKind::Random(RandomKind::Regex) => match &self.pattern {
                Some(regex) => SqlValue::Text(rng.sample::<String, _>(regex)),
                None => {
                    return Err(GenerationError::constraint(
                        self.kind.to_string(),
                        "pattern was not compiled",
                    ));
                }
            },
            GeneratorKind::Random(kind) => random::generate(kind, &self.constraints, rng)?,
            GeneratorKind::Date(kind) => date::generate(kind, &self.constraints, rng)?,
            GeneratorKind::Commerce(kind) => commerce::generate(kind, &self.constraints, rng)?,
            GeneratorKind::Shuffle => {
                return shuffle::shuffle(source, self.kind, &self.constraints, rng);
            }
            kind => semantic::generate(kind, &self.constraints, rng)?,
        };
        coerce(raw, self.kind, &self.constraints, rng)
    }
}

impl ColumnGenerator {
    /// Accept a previously recorded value for this column.
    ///
    /// Returns `None` when the text does not fit the column type or exceeds
    /// its length cap, so the caller can fall back to fresh generation.
    pub fn accept_recorded(&self, text: &str) -> Option<SqlValue> {
        let value = SqlValue::parse_typed(text, self.constraints.sql_type)?;
        if self.constraints.sql_type.family() == TypeFamily::Text
            && let Some(cap) = self.constraints.length_cap(self.kind)
            && text.chars().count() > cap
        {
            return None;
        }
        Some(value)
    }
}

/// Generate a single value without keeping a [`ColumnGenerator`] around.
pub fn generate<R: Rng>(
    kind: GeneratorKind,
    constraints: &Constraints,
    source: &SqlValue,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    ColumnGenerator::from_kind(kind, constraints.clone())?.generate(source, rng)
}

/// Convert a raw generated value into the shape the column stores.
pub fn coerce<R: Rng>(
    value: SqlValue,
    kind: GeneratorKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let sql_type = constraints.sql_type;
    let incompatible = |value: &SqlValue| GenerationError::IncompatibleType {
        kind: kind.to_string(),
        value: value.canonical().unwrap_or_default(),
        sql_type,
    };

    let coerced = match (sql_type.family(), value) {
        (_, SqlValue::Null) => SqlValue::Null,
        (TypeFamily::Text, value) => {
            let text = value.canonical().unwrap_or_default();
            SqlValue::Text(fit_text(text, kind, constraints, rng))
        }
        (TypeFamily::Integer, SqlValue::Int(number)) => {
            let in_range = sql_type
                .integer_range()
                .is_some_and(|(min, max)| (min..=max).contains(&number));
            if !in_range {
                return Err(incompatible(&SqlValue::Int(number)));
            }
            SqlValue::Int(number)
        }
        (TypeFamily::Decimal, SqlValue::Float(number)) => {
            SqlValue::Float(round_to_scale(number, constraints.numeric_scale.unwrap_or(2)))
        }
        (TypeFamily::Decimal | TypeFamily::Float, SqlValue::Int(number)) => {
            SqlValue::Float(number as f64)
        }
        (TypeFamily::Float, SqlValue::Float(number)) => SqlValue::Float(number),
        (TypeFamily::Time, SqlValue::DateTime(value)) => SqlValue::Time(value.time()),
        (TypeFamily::Time, SqlValue::Time(value)) => SqlValue::Time(value),
        (TypeFamily::DateTime, SqlValue::Time(value)) => {
            SqlValue::DateTime(constraints.today.and_time(value))
        }
        (_, value) => {
            let text = value.canonical().unwrap_or_default();
            SqlValue::parse_typed(&text, sql_type).ok_or_else(|| incompatible(&value))?
        }
    };
    Ok(coerced)
}

/// Apply the length cap and, when requested, pad to the declared length.
fn fit_text<R: Rng>(
    mut text: String,
    kind: GeneratorKind,
    constraints: &Constraints,
    rng: &mut R,
) -> String {
    if let Some(cap) = constraints.length_cap(kind) {
        truncate_chars(&mut text, cap);
    }
    if let Some(target) = constraints.exact_target(kind) {
        let alphabet: Vec<char> = constraints.alphabet().chars().collect();
        let mut len = text.chars().count();
        while len < target {
            text.push(alphabet[rng.random_range(0..alphabet.len())]);
            len += 1;
        }
    }
    text
}

pub(crate) fn truncate_chars(text: &mut String, max: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
}

pub(crate) fn round_to_scale(value: f64, scale: u32) -> f64 {
    let factor = 10_f64.powi(scale.min(10) as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
    }

    #[test]
    fn parses_case_insensitive_kinds() {
        assert_eq!(
            GeneratorKind::parse("random", Some("NUMBER")).ok(),
            Some(GeneratorKind::Random(RandomKind::Number))
        );
        assert_eq!(
            GeneratorKind::parse("Shuffle", None).ok(),
            Some(GeneratorKind::Shuffle)
        );
        assert!(matches!(
            GeneratorKind::parse("Vehicle", Some("Model")),
            Err(GenerationError::UnsupportedGenerationType { .. })
        ));
        assert!(GeneratorKind::parse("Name", None).is_err());
    }

    #[test]
    fn text_is_truncated_to_declared_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut constraints = Constraints::new(SqlType::VarChar, LocaleKey::EnUs, today());
        constraints.declared_length = Some(4);
        let kind = GeneratorKind::Name(NameKind::FullName);
        let value = coerce(
            SqlValue::Text("Alexander".to_string()),
            kind,
            &constraints,
            &mut rng,
        )
        .expect("coerce");
        assert_eq!(value, SqlValue::Text("Alex".to_string()));
    }

    #[test]
    fn exact_length_pads_short_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut constraints = Constraints::new(SqlType::Char, LocaleKey::EnUs, today());
        constraints.declared_length = Some(8);
        constraints.exact_length = true;
        let kind = GeneratorKind::Name(NameKind::FirstName);
        let value = coerce(SqlValue::Text("Ann".to_string()), kind, &constraints, &mut rng)
            .expect("coerce");
        assert_eq!(value.as_str().map(|text| text.chars().count()), Some(8));
        assert!(value.as_str().is_some_and(|text| text.starts_with("Ann")));
    }

    #[test]
    fn exact_length_stops_at_the_rule_maximum() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut constraints = Constraints::new(SqlType::Char, LocaleKey::EnUs, today());
        constraints.declared_length = Some(10);
        constraints.max = Some(Bound::Int(6));
        constraints.exact_length = true;
        let kind = GeneratorKind::Name(NameKind::FirstName);
        let value = coerce(SqlValue::Text("Ann".to_string()), kind, &constraints, &mut rng)
            .expect("coerce");
        assert_eq!(value.as_str().map(|text| text.chars().count()), Some(6));

        let random = GeneratorKind::Random(RandomKind::String);
        assert_eq!(constraints.string_length_range(random), (6, 6));
    }

    #[test]
    fn names_do_not_fit_integer_columns() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let constraints = Constraints::new(SqlType::Int, LocaleKey::EnUs, today());
        let result = coerce(
            SqlValue::Text("Maria".to_string()),
            GeneratorKind::Name(NameKind::FirstName),
            &constraints,
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(GenerationError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn regex_kind_requires_a_valid_pattern() {
        let constraints = Constraints::new(SqlType::VarChar, LocaleKey::EnUs, today());
        let kind = GeneratorKind::Random(RandomKind::Regex);
        assert!(ColumnGenerator::from_kind(kind, constraints.clone()).is_err());

        let mut with_pattern = constraints;
        with_pattern.format = Some("[A-Z]{3}-[0-9]{2}".to_string());
        let generator = ColumnGenerator::from_kind(kind, with_pattern).expect("compile");
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let value = generator
            .generate(&SqlValue::Null, &mut rng)
            .expect("generate");
        let text = value.as_str().unwrap_or_default().to_string();
        assert_eq!(text.len(), 6);
        assert_eq!(text.as_bytes()[3], b'-');
    }

    #[test]
    fn recorded_values_must_fit_the_column() {
        let mut constraints = Constraints::new(SqlType::VarChar, LocaleKey::EnUs, today());
        constraints.declared_length = Some(5);
        let generator =
            ColumnGenerator::from_kind(GeneratorKind::Name(NameKind::LastName), constraints)
                .expect("generator");
        assert_eq!(
            generator.accept_recorded("Smith"),
            Some(SqlValue::Text("Smith".to_string()))
        );
        assert_eq!(generator.accept_recorded("Johnson"), None);

        let int_generator = ColumnGenerator::from_kind(
            GeneratorKind::Random(RandomKind::Number),
            Constraints::new(SqlType::SmallInt, LocaleKey::EnUs, today()),
        )
        .expect("generator");
        assert_eq!(int_generator.accept_recorded("42"), Some(SqlValue::Int(42)));
        assert_eq!(int_generator.accept_recorded("Smith"), None);
        assert_eq!(int_generator.accept_recorded("70000"), None);
    }
}
