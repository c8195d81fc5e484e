//! Publishing authorities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A municipal authority that publishes acts.
///
/// Serialized by its English name, which is also the value the record store
/// uses for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Issuer {
    Vinnytsia,
    Lutsk,
    Dnipro,
    Kramatorsk,
    Zhytomyr,
    Uzhhorod,
    Zaporizhia,
    #[serde(rename = "Ivano-Frankivsk")]
    IvanoFrankivsk,
    Kropyvnytskyi,
    Sievierodonetsk,
    Lviv,
    Kyiv,
    Sevastopol,
    Mykolaiv,
    Odessa,
    Poltava,
    Rivne,
    Sumy,
    Ternopil,
    Kharkiv,
    Kherson,
    Khmelnytskyi,
    Cherkasy,
    Chernivtsi,
    Chernihiv,
}

impl Issuer {
    /// Every known issuer, in the record store's declaration order
    pub const ALL: [Issuer; 25] = [
        Issuer::Vinnytsia,
        Issuer::Lutsk,
        Issuer::Dnipro,
        Issuer::Kramatorsk,
        Issuer::Zhytomyr,
        Issuer::Uzhhorod,
        Issuer::Zaporizhia,
        Issuer::IvanoFrankivsk,
        Issuer::Kropyvnytskyi,
        Issuer::Sievierodonetsk,
        Issuer::Lviv,
        Issuer::Kyiv,
        Issuer::Sevastopol,
        Issuer::Mykolaiv,
        Issuer::Odessa,
        Issuer::Poltava,
        Issuer::Rivne,
        Issuer::Sumy,
        Issuer::Ternopil,
        Issuer::Kharkiv,
        Issuer::Kherson,
        Issuer::Khmelnytskyi,
        Issuer::Cherkasy,
        Issuer::Chernivtsi,
        Issuer::Chernihiv,
    ];

    /// Identifier used by the record store and in progress events
    pub fn as_str(&self) -> &'static str {
        match self {
            Issuer::Vinnytsia => "Vinnytsia",
            Issuer::Lutsk => "Lutsk",
            Issuer::Dnipro => "Dnipro",
            Issuer::Kramatorsk => "Kramatorsk",
            Issuer::Zhytomyr => "Zhytomyr",
            Issuer::Uzhhorod => "Uzhhorod",
            Issuer::Zaporizhia => "Zaporizhia",
            Issuer::IvanoFrankivsk => "Ivano-Frankivsk",
            Issuer::Kropyvnytskyi => "Kropyvnytskyi",
            Issuer::Sievierodonetsk => "Sievierodonetsk",
            Issuer::Lviv => "Lviv",
            Issuer::Kyiv => "Kyiv",
            Issuer::Sevastopol => "Sevastopol",
            Issuer::Mykolaiv => "Mykolaiv",
            Issuer::Odessa => "Odessa",
            Issuer::Poltava => "Poltava",
            Issuer::Rivne => "Rivne",
            Issuer::Sumy => "Sumy",
            Issuer::Ternopil => "Ternopil",
            Issuer::Kharkiv => "Kharkiv",
            Issuer::Kherson => "Kherson",
            Issuer::Khmelnytskyi => "Khmelnytskyi",
            Issuer::Cherkasy => "Cherkasy",
            Issuer::Chernivtsi => "Chernivtsi",
            Issuer::Chernihiv => "Chernihiv",
        }
    }

    /// Ukrainian city name
    pub fn display_name(&self) -> &'static str {
        match self {
            Issuer::Vinnytsia => "Вінниця",
            Issuer::Lutsk => "Луцьк",
            Issuer::Dnipro => "Дніпро",
            Issuer::Kramatorsk => "Краматорськ",
            Issuer::Zhytomyr => "Житомир",
            Issuer::Uzhhorod => "Ужгород",
            Issuer::Zaporizhia => "Запоріжжя",
            Issuer::IvanoFrankivsk => "Івано-Франківськ",
            Issuer::Kropyvnytskyi => "Кропивницький",
            Issuer::Sievierodonetsk => "Сєвєродонецьк",
            Issuer::Lviv => "Львів",
            Issuer::Kyiv => "Київ",
            Issuer::Sevastopol => "Севастополь",
            Issuer::Mykolaiv => "Миколаїв",
            Issuer::Odessa => "Одеса",
            Issuer::Poltava => "Полтава",
            Issuer::Rivne => "Рівне",
            Issuer::Sumy => "Суми",
            Issuer::Ternopil => "Тернопіль",
            Issuer::Kharkiv => "Харків",
            Issuer::Kherson => "Херсон",
            Issuer::Khmelnytskyi => "Хмельницький",
            Issuer::Cherkasy => "Черкаси",
            Issuer::Chernivtsi => "Чернівці",
            Issuer::Chernihiv => "Чернігів",
        }
    }

    /// Suffix used for per-issuer environment variables (`IVANO_FRANKIVSK`)
    pub fn env_suffix(&self) -> String {
        self.as_str().to_uppercase().replace('-', "_")
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Issuer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Issuer::ALL
            .iter()
            .copied()
            .find(|issuer| issuer.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("Unknown issuer: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_str() {
        for issuer in Issuer::ALL {
            assert_eq!(issuer.as_str().parse::<Issuer>().unwrap(), issuer);
        }
        assert_eq!("dnipro".parse::<Issuer>().unwrap(), Issuer::Dnipro);
        assert!("Atlantis".parse::<Issuer>().is_err());
    }

    #[test]
    fn test_serde_uses_store_names() {
        let json = serde_json::to_string(&Issuer::IvanoFrankivsk).unwrap();
        assert_eq!(json, "\"Ivano-Frankivsk\"");
        let parsed: Issuer = serde_json::from_str("\"Sumy\"").unwrap();
        assert_eq!(parsed, Issuer::Sumy);
    }

    #[test]
    fn test_display_names_are_ukrainian() {
        assert_eq!(Issuer::Dnipro.display_name(), "Дніпро");
        assert_eq!(Issuer::IvanoFrankivsk.display_name(), "Івано-Франківськ");
        assert!(Issuer::ALL.iter().all(|issuer| !issuer.display_name().is_ascii()));
    }

    #[test]
    fn test_env_suffix() {
        assert_eq!(Issuer::IvanoFrankivsk.env_suffix(), "IVANO_FRANKIVSK");
        assert_eq!(Issuer::Dnipro.env_suffix(), "DNIPRO");
    }
}
