use crate::domain::models::{validate_fraction, Allocation, Category, CategoryRules};
use crate::infrastructure::error::InfraError;
use chrono::{Duration, Weekday};
use chrono_tz::Tz;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
// A seed is time already spent this week, so it cannot exceed the week itself.
const MAX_SEED_HOURS: f64 = 168.0;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Sunday => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreKind {
    #[default]
    File,
    Keyring,
}

/// Mapping that keeps document order, so `keywords` can express category precedence.
#[derive(Debug, Clone, PartialEq)]
struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V> Deserialize<'de> for OrderedMap<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V> Visitor<'de> for OrderedMapVisitor<V>
        where
            V: Deserialize<'de>,
        {
            type Value = OrderedMap<V>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping keyed by category name")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(OrderedMap::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    if entries.iter().any(|(existing, _)| existing == &key) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate category '{key}'"
                        )));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    timezone: Option<String>,
    week_start: Option<WeekStart>,
    target_utilization: Option<f64>,
    count_out_of_office: Option<bool>,
    credential_store: Option<CredentialStoreKind>,
    keywords: OrderedMap<Option<Vec<String>>>,
    #[serde(default)]
    allocations: OrderedMap<f64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rules: CategoryRules,
    pub seed: Allocation,
    pub timezone: Option<Tz>,
    pub week_start: WeekStart,
    pub target_utilization: Option<f64>,
    pub count_out_of_office: bool,
    pub credential_store: CredentialStoreKind,
}

pub fn load_config(path: &Path) -> Result<AppConfig, InfraError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        InfraError::InvalidConfig(format!("cannot read {}: {error}", path.display()))
    })?;
    parse_config(&raw).map_err(|error| match error {
        InfraError::InvalidConfig(message) => {
            InfraError::InvalidConfig(format!("{message} in {}", path.display()))
        }
        other => other,
    })
}

pub fn parse_config(raw: &str) -> Result<AppConfig, InfraError> {
    let parsed: ConfigFile = serde_yaml::from_str(raw)?;

    let categories = parsed
        .keywords
        .0
        .into_iter()
        .map(|(name, keywords)| Category::new(name, keywords.unwrap_or_default()))
        .collect();
    let rules = CategoryRules::new(categories).map_err(InfraError::InvalidConfig)?;

    let mut seed = Allocation::default();
    for (category, hours) in parsed.allocations.0 {
        seed.add(&category, seed_duration(&category, hours)?)
            .map_err(InfraError::InvalidConfig)?;
    }

    let timezone = parsed
        .timezone
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<Tz>().map_err(|error| {
                InfraError::InvalidConfig(format!("unknown timezone '{value}': {error}"))
            })
        })
        .transpose()?;

    if let Some(target) = parsed.target_utilization {
        validate_fraction(target, "targetUtilization").map_err(InfraError::InvalidConfig)?;
    }

    Ok(AppConfig {
        rules,
        seed,
        timezone,
        week_start: parsed.week_start.unwrap_or_default(),
        target_utilization: parsed.target_utilization,
        count_out_of_office: parsed.count_out_of_office.unwrap_or(true),
        credential_store: parsed.credential_store.unwrap_or_default(),
    })
}

fn seed_duration(category: &str, hours: f64) -> Result<Duration, InfraError> {
    if !hours.is_finite() || !(0.0..=MAX_SEED_HOURS).contains(&hours) {
        return Err(InfraError::InvalidConfig(format!(
            "allocation for '{category}' must be between 0 and {MAX_SEED_HOURS} hours, got {hours}"
        )));
    }
    Ok(Duration::milliseconds((hours * 3_600_000.0).round() as i64))
}
