use std::fmt;

/// Locales the semantic generators can produce data for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocaleKey {
    #[default]
    EnUs,
    PtBr,
    FrFr,
}

impl LocaleKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.replace('-', "_").to_lowercase().as_str() {
            "en_us" | "en" => Some(Self::EnUs),
            "pt_br" => Some(Self::PtBr),
            "fr_fr" | "fr" => Some(Self::FrFr),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en_US",
            Self::PtBr => "pt_BR",
            Self::FrFr => "fr_FR",
        }
    }
}

impl fmt::Display for LocaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
