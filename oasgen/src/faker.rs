//! Locale-aware fake data for string formats.
//!
//! `LocalizedFaker` knows a fixed set of OpenAPI string formats. Anything it does
//! not know falls back to a uuid, which is a valid value for most free-form strings.

use chrono::{DateTime, NaiveDate, Utc};
use fake::Fake;
use fake::faker::internet::raw::{DomainSuffix, IPv4, IPv6, Password, SafeEmail};
use fake::faker::lorem::raw::{Sentence, Word};
use fake::faker::name::raw::Name;
use fake::locales::{AR_SA, DE_DE, EN, FR_FR, JA_JP, PT_BR, ZH_CN, ZH_TW};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

/// Locales supported for generated names, emails and text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FakerLocale {
    #[default]
    #[serde(rename = "en_US", alias = "en")]
    En,
    #[serde(rename = "fr_FR")]
    FrFr,
    #[serde(rename = "de_DE")]
    DeDe,
    #[serde(rename = "pt_BR")]
    PtBr,
    #[serde(rename = "ja_JP")]
    JaJp,
    #[serde(rename = "zh_CN")]
    ZhCn,
    #[serde(rename = "zh_TW")]
    ZhTw,
    #[serde(rename = "ar_SA")]
    ArSa,
}

// Expands a `fake` raw faker for the runtime locale.
macro_rules! localized {
    ($locale:expr, $rng:expr, $faker:ident $(, $arg:expr)*) => {
        match $locale {
            FakerLocale::En => $faker(EN $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::FrFr => $faker(FR_FR $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::DeDe => $faker(DE_DE $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::PtBr => $faker(PT_BR $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::JaJp => $faker(JA_JP $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::ZhCn => $faker(ZH_CN $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::ZhTw => $faker(ZH_TW $(, $arg)*).fake_with_rng::<String, _>($rng),
            FakerLocale::ArSa => $faker(AR_SA $(, $arg)*).fake_with_rng::<String, _>($rng),
        }
    };
}

const HOST_PREFIXES: &[&str] = &["web", "db", "srv", "mail", "lt", "desktop", "laptop"];

// 1970-01-01 and 2037-12-31 as days from the common era.
const MIN_DAY: i32 = 719_163;
const MAX_DAY: i32 = 743_731;
const MAX_TIMESTAMP: i64 = 2_145_916_799;

/// Fake data provider bound to a locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalizedFaker {
    locale: FakerLocale,
}

impl LocalizedFaker {
    #[must_use]
    pub fn new(locale: FakerLocale) -> Self {
        LocalizedFaker { locale }
    }

    #[must_use]
    pub fn locale(&self) -> FakerLocale {
        self.locale
    }

    pub fn set_locale(&mut self, locale: FakerLocale) {
        self.locale = locale;
    }

    /// Generates a string for an OpenAPI `format`, falling back to a uuid for
    /// formats without a dedicated provider.
    pub fn fake_string<R: Rng>(&self, format: &str, rng: &mut R) -> String {
        match format {
            "date" => random_date(rng),
            "date-time" | "date_time" => random_date_time(rng),
            "password" => self.password(rng),
            "email" => self.email(rng),
            "uri" => self.uri(rng),
            "url" => self.url(rng),
            "hostname" => self.hostname(rng),
            "ipv4" => self.ipv4(rng),
            "ipv6" => self.ipv6(rng),
            "name" => self.name(rng),
            "text" | "description" => self.text(rng),
            _ => random_uuid(rng).to_string(),
        }
    }

    pub fn password<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, Password, 10..16)
    }

    pub fn email<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, SafeEmail)
    }

    pub fn uri<R: Rng>(&self, rng: &mut R) -> String {
        let domain = self.domain(rng);
        let path = ascii_word(&localized!(self.locale, rng, Word));
        format!("https://www.{domain}/{path}")
    }

    pub fn url<R: Rng>(&self, rng: &mut R) -> String {
        format!("https://{}/", self.domain(rng))
    }

    pub fn hostname<R: Rng>(&self, rng: &mut R) -> String {
        let prefix = HOST_PREFIXES.choose(rng).copied().unwrap_or("web");
        let number: u8 = rng.random_range(0..100);
        format!("{prefix}-{number:02}.{}", self.domain(rng))
    }

    pub fn ipv4<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, IPv4)
    }

    pub fn ipv6<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, IPv6)
    }

    pub fn name<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, Name)
    }

    pub fn text<R: Rng>(&self, rng: &mut R) -> String {
        localized!(self.locale, rng, Sentence, 4..12)
    }

    fn domain<R: Rng>(&self, rng: &mut R) -> String {
        let word = ascii_word(&localized!(self.locale, rng, Word));
        let suffix = ascii_word(&localized!(self.locale, rng, DomainSuffix));
        format!("{word}.{suffix}")
    }
}

/// A uuid whose random bits come from `rng`, so seeded runs are reproducible.
pub fn random_uuid<R: Rng>(rng: &mut R) -> Uuid {
    let mut bytes = [0_u8; 16];
    rng.fill(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid()
}

/// `YYYY-MM-DD`
pub fn random_date<R: Rng>(rng: &mut R) -> String {
    let day = rng.random_range(MIN_DAY..=MAX_DAY);
    NaiveDate::from_num_days_from_ce_opt(day)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// `YYYY-MM-DDTHH:MM:SSZ`
pub fn random_date_time<R: Rng>(rng: &mut R) -> String {
    let secs = rng.random_range(0..=MAX_TIMESTAMP);
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// 32 lowercase hex characters, the shape of most generated resource ids.
pub fn random_hex_token<R: Rng>(rng: &mut R) -> String {
    random_uuid(rng).simple().to_string()
}

fn ascii_word(word: &str) -> String {
    let cleaned: String = word
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        "example".to_owned()
    } else {
        cleaned
    }
}
