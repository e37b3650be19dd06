use fake::Fake;
use fake::faker::address::raw as address;
use fake::faker::company::raw as company;
use fake::faker::creditcard::raw::CreditCardNumber;
use fake::faker::currency::raw::CurrencyCode;
use fake::faker::internet::raw as internet;
use fake::faker::job::raw::Title as JobTitle;
use fake::faker::lorem::raw as lorem;
use fake::faker::name::raw as name;
use fake::faker::phone_number::raw as phone;
use fake::locales::{EN, FR_FR, PT_BR};
use rand::Rng;

use dbmask_core::SqlValue;

use crate::errors::GenerationError;
use crate::generators::random::{apply_format, float_bounds, random_digits, random_string};
use crate::generators::{
    AddressKind, CompanyKind, Constraints, FinanceKind, GeneratorKind, InternetKind, LocaleKey,
    LoremKind, NameKind, PhoneKind, round_to_scale,
};

/// Run a `fake` raw faker in the configured locale.
macro_rules! localized {
    ($ty:ty; $locale:expr, $rng:expr, $faker:path $(, $arg:expr)*) => {{
        let value: $ty = match $locale {
            LocaleKey::EnUs => $faker(EN $(, $arg)*).fake_with_rng($rng),
            LocaleKey::PtBr => $faker(PT_BR $(, $arg)*).fake_with_rng($rng),
            LocaleKey::FrFr => $faker(FR_FR $(, $arg)*).fake_with_rng($rng),
        };
        value
    }};
}

const BIC_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ISIN_COUNTRIES: &[&str] = &["US", "GB", "DE", "FR", "NL", "BR", "CH", "JP"];
const DEFAULT_ACCOUNT_LENGTH: usize = 10;

pub fn generate<R: Rng>(
    kind: GeneratorKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let locale = constraints.locale;
    let text = match kind {
        GeneratorKind::Name(kind) => name_value(kind, locale, rng),
        GeneratorKind::Address(kind) => address_value(kind, locale, rng),
        GeneratorKind::Internet(kind) => internet_value(kind, constraints, rng),
        GeneratorKind::Phone(kind) => phone_value(kind, constraints, rng),
        GeneratorKind::Company(kind) => company_value(kind, locale, rng),
        GeneratorKind::Finance(FinanceKind::Amount) => {
            let (min, max) = float_bounds(kind, constraints, (0.0, 10_000.0))?;
            let value = if min == max {
                min
            } else {
                rng.random_range(min..=max)
            };
            return Ok(SqlValue::Float(round_to_scale(value, 2)));
        }
        GeneratorKind::Finance(kind) => finance_value(kind, constraints, rng),
        GeneratorKind::Lorem(kind) => lorem_value(kind, constraints, rng),
        other => {
            return Err(GenerationError::constraint(
                other.to_string(),
                "not a semantic generator",
            ));
        }
    };
    Ok(SqlValue::Text(text))
}

fn name_value<R: Rng>(kind: NameKind, locale: LocaleKey, rng: &mut R) -> String {
    match kind {
        NameKind::FirstName => localized!(String; locale, rng, name::FirstName),
        NameKind::LastName => localized!(String; locale, rng, name::LastName),
        NameKind::FullName => localized!(String; locale, rng, name::Name),
        NameKind::Prefix => localized!(String; locale, rng, name::Title),
        NameKind::Suffix => localized!(String; locale, rng, name::Suffix),
        NameKind::JobTitle => localized!(String; locale, rng, JobTitle),
    }
}

fn address_value<R: Rng>(kind: AddressKind, locale: LocaleKey, rng: &mut R) -> String {
    match kind {
        AddressKind::City => localized!(String; locale, rng, address::CityName),
        AddressKind::Country => localized!(String; locale, rng, address::CountryName),
        AddressKind::CountryCode => localized!(String; locale, rng, address::CountryCode),
        AddressKind::StreetName => localized!(String; locale, rng, address::StreetName),
        AddressKind::State => localized!(String; locale, rng, address::StateName),
        AddressKind::StateAbbr => localized!(String; locale, rng, address::StateAbbr),
        AddressKind::ZipCode => localized!(String; locale, rng, address::ZipCode),
        AddressKind::BuildingNumber => localized!(String; locale, rng, address::BuildingNumber),
        AddressKind::SecondaryAddress => {
            localized!(String; locale, rng, address::SecondaryAddress)
        }
        AddressKind::StreetAddress => street_address(locale, rng),
        AddressKind::FullAddress => {
            let street = street_address(locale, rng);
            let city = localized!(String; locale, rng, address::CityName);
            let state = localized!(String; locale, rng, address::StateAbbr);
            let zip = localized!(String; locale, rng, address::ZipCode);
            format!("{street}, {city}, {state} {zip}")
        }
    }
}

fn street_address<R: Rng>(locale: LocaleKey, rng: &mut R) -> String {
    let number = localized!(String; locale, rng, address::BuildingNumber);
    let street = localized!(String; locale, rng, address::StreetName);
    format!("{number} {street}")
}

fn internet_value<R: Rng>(kind: InternetKind, constraints: &Constraints, rng: &mut R) -> String {
    let locale = constraints.locale;
    match kind {
        InternetKind::Email => localized!(String; locale, rng, internet::FreeEmail),
        InternetKind::SafeEmail => localized!(String; locale, rng, internet::SafeEmail),
        InternetKind::UserName => localized!(String; locale, rng, internet::Username),
        InternetKind::Password => {
            let (min, max) = constraints.string_length_range(GeneratorKind::Internet(kind));
            let min = min.max(8).min(max);
            localized!(String; locale, rng, internet::Password, min..max + 1)
        }
        InternetKind::IPv4 => localized!(String; locale, rng, internet::IPv4),
        InternetKind::IPv6 => localized!(String; locale, rng, internet::IPv6),
        InternetKind::Mac => localized!(String; locale, rng, internet::MACAddress),
        InternetKind::DomainSuffix => localized!(String; locale, rng, internet::DomainSuffix),
        InternetKind::UserAgent => localized!(String; locale, rng, internet::UserAgent),
        InternetKind::Url => {
            let word = localized!(String; locale, rng, lorem::Word);
            let suffix = localized!(String; locale, rng, internet::DomainSuffix);
            format!("https://www.{}.{suffix}", word.to_lowercase())
        }
    }
}

fn phone_value<R: Rng>(kind: PhoneKind, constraints: &Constraints, rng: &mut R) -> String {
    if let Some(format) = &constraints.format {
        return apply_format(format, rng);
    }
    let locale = constraints.locale;
    let number = match kind {
        PhoneKind::PhoneNumber => localized!(String; locale, rng, phone::PhoneNumber),
        PhoneKind::CellNumber => localized!(String; locale, rng, phone::CellNumber),
    };
    match &constraints.separator {
        Some(separator) => number
            .split(|ch: char| !ch.is_ascii_digit())
            .filter(|group| !group.is_empty())
            .collect::<Vec<_>>()
            .join(separator),
        None => number,
    }
}

fn company_value<R: Rng>(kind: CompanyKind, locale: LocaleKey, rng: &mut R) -> String {
    match kind {
        CompanyKind::CompanyName => localized!(String; locale, rng, company::CompanyName),
        CompanyKind::Suffix => localized!(String; locale, rng, company::CompanySuffix),
        CompanyKind::Industry => localized!(String; locale, rng, company::Industry),
        CompanyKind::CatchPhrase => localized!(String; locale, rng, company::CatchPhrase),
        CompanyKind::Bs => localized!(String; locale, rng, company::Bs),
    }
}

fn finance_value<R: Rng>(kind: FinanceKind, constraints: &Constraints, rng: &mut R) -> String {
    let locale = constraints.locale;
    match kind {
        FinanceKind::Account => match &constraints.format {
            Some(format) => apply_format(format, rng),
            None => random_digits(DEFAULT_ACCOUNT_LENGTH, rng),
        },
        FinanceKind::CreditCardNumber => localized!(String; locale, rng, CreditCardNumber),
        FinanceKind::CurrencyCode => localized!(String; locale, rng, CurrencyCode),
        FinanceKind::Bic => {
            let bank = random_string(BIC_LETTERS, 4, rng);
            let country = ISIN_COUNTRIES[rng.random_range(0..ISIN_COUNTRIES.len())];
            let location = random_string("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789", 2, rng);
            format!("{bank}{country}{location}")
        }
        FinanceKind::Isin => {
            let country = ISIN_COUNTRIES[rng.random_range(0..ISIN_COUNTRIES.len())];
            let body = format!(
                "{country}{}",
                random_string("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789", 9, rng)
            );
            let check = isin_check_digit(&body);
            format!("{body}{check}")
        }
        FinanceKind::Amount => String::new(),
    }
}

fn lorem_value<R: Rng>(kind: LoremKind, constraints: &Constraints, rng: &mut R) -> String {
    let locale = constraints.locale;
    match kind {
        LoremKind::Word => localized!(String; locale, rng, lorem::Word),
        LoremKind::Words => {
            let words = localized!(Vec<String>; locale, rng, lorem::Words, 3..6);
            words.join(constraints.separator.as_deref().unwrap_or(" "))
        }
        LoremKind::Sentence => localized!(String; locale, rng, lorem::Sentence, 4..10),
        LoremKind::Paragraph => localized!(String; locale, rng, lorem::Paragraph, 3..6),
        LoremKind::Text => {
            let paragraphs = localized!(Vec<String>; locale, rng, lorem::Paragraphs, 2..4);
            paragraphs.join(constraints.separator.as_deref().unwrap_or("\n"))
        }
    }
}

/// Luhn check digit over the ISIN body with letters expanded to numbers.
fn isin_check_digit(body: &str) -> u32 {
    let digits: Vec<u32> = body
        .chars()
        .flat_map(|ch| match ch.to_digit(36) {
            Some(value) if value >= 10 => vec![value / 10, value % 10],
            Some(value) => vec![value],
            None => Vec::new(),
        })
        .collect();
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, digit)| {
            if idx % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                *digit
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use dbmask_core::SqlType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn constraints(locale: LocaleKey) -> Constraints {
        Constraints::new(
            SqlType::NVarChar,
            locale,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
        )
    }

    #[test]
    fn isin_check_digit_matches_known_code() {
        assert_eq!(isin_check_digit("US037833100"), 5);
    }

    #[test]
    fn same_seed_reproduces_names() {
        let constraints = constraints(LocaleKey::PtBr);
        let kind = GeneratorKind::Name(NameKind::FullName);
        let first = generate(kind, &constraints, &mut ChaCha8Rng::seed_from_u64(5)).expect("name");
        let second = generate(kind, &constraints, &mut ChaCha8Rng::seed_from_u64(5)).expect("name");
        assert_eq!(first, second);
        assert!(first.as_str().is_some_and(|text| !text.is_empty()));
    }

    #[test]
    fn phone_separator_rejoins_digit_groups() {
        let mut constraints = constraints(LocaleKey::EnUs);
        constraints.separator = Some(".".to_string());
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let value = phone_value(PhoneKind::PhoneNumber, &constraints, &mut rng);
        assert!(value.chars().all(|ch| ch.is_ascii_digit() || ch == '.'));
    }

    #[test]
    fn email_contains_at_sign() {
        let constraints = constraints(LocaleKey::FrFr);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let value = generate(
            GeneratorKind::Internet(InternetKind::Email),
            &constraints,
            &mut rng,
        )
        .expect("email");
        assert!(value.as_str().is_some_and(|text| text.contains('@')));
    }
}
