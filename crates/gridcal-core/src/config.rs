use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::state::{
  CalendarFlags,
  CalendarSettings,
  ViewType
};

pub const CONFIG_ENV_VAR: &str =
  "GRIDCAL_CONFIG";
pub const TIMEZONE_ENV_VAR: &str =
  "GRIDCAL_TIMEZONE";
const CONFIG_DIR_NAME: &str = "gridcal";
const CONFIG_FILE_NAME: &str =
  "config.toml";

fn config_true() -> bool {
  true
}

fn config_default_view() -> String {
  ViewType::Month.as_key().to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub timezone:     Option<String>,
  #[serde(default)]
  pub calendar:     CalendarSection,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarSection {
  #[serde(
    default = "config_default_view"
  )]
  pub default_view:     String,
  #[serde(default)]
  pub fade_past_events: bool,
  #[serde(default = "config_true")]
  pub color:            bool
}

impl Default for CalendarSection {
  fn default() -> Self {
    Self {
      default_view:     config_default_view(
      ),
      fade_past_events: false,
      color:            true
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone:     None,
      calendar:     CalendarSection::default(
      ),
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Loads the config file, or defaults when there is none.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let env_path =
      std::env::var(CONFIG_ENV_VAR).ok();
    let path = resolve_config_path(
      config_override,
      env_path.as_deref(),
      dirs::config_dir().as_deref()
    );

    match path {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)
      }
      | None => {
        debug!(
          "no config file found; using \
           defaults"
        );
        Ok(Self::default())
      }
    }
  }

  #[tracing::instrument]
  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let mut cfg: Config =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(
      path.to_path_buf()
    );
    cfg.sanitize();
    Ok(cfg)
  }

  fn sanitize(&mut self) {
    if ViewType::from_key(
      &self.calendar.default_view
    )
    .is_none()
    {
      warn!(
        default_view = %self.calendar.default_view,
        "unknown default view; using month"
      );
      self.calendar.default_view =
        config_default_view();
    }

    if self
      .timezone
      .as_deref()
      .is_some_and(|tz| {
        tz.trim().is_empty()
      })
    {
      self.timezone = None;
    }
  }

  /// Applies `key=value` overrides; an `rc.` prefix is accepted.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .trim()
        .to_string();
      let value = v.trim().to_string();
      debug!(key = %key, value = %value, "applying override");

      match key.as_str() {
        | "timezone" => {
          self.timezone = Some(value);
        }
        | "calendar.default_view" => {
          self.calendar.default_view =
            value;
        }
        | "calendar.fade_past_events" => {
          self
            .calendar
            .fade_past_events =
            parse_bool(&value)
              .ok_or_else(|| {
                anyhow!(
                  "invalid boolean for \
                   {key}: {value}"
                )
              })?;
        }
        | "calendar.color" => {
          self.calendar.color =
            parse_bool(&value)
              .ok_or_else(|| {
                anyhow!(
                  "invalid boolean for \
                   {key}: {value}"
                )
              })?;
        }
        | _ => {
          warn!(key = %key, "unknown config key; ignoring override");
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  /// Calendar defaults with the timezone resolved.
  pub fn settings(
    &self
  ) -> anyhow::Result<CalendarSettings> {
    let env_tz =
      std::env::var(TIMEZONE_ENV_VAR)
        .ok();
    let timezone = resolve_timezone(
      env_tz.as_deref(),
      self.timezone.as_deref()
    )?;

    Ok(CalendarSettings {
      timezone,
      default_view: ViewType::from_key(
        &self.calendar.default_view
      )
      .unwrap_or_default(),
      flags: CalendarFlags {
        fade_past_events: self
          .calendar
          .fade_past_events
      }
    })
  }
}

fn resolve_config_path(
  override_path: Option<&Path>,
  env_path: Option<&str>,
  config_dir: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Some(raw) = env_path {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return None;
    }
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let candidate = config_dir?
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  candidate.exists().then_some(candidate)
}

/// Environment beats the config file; neither means UTC.
fn resolve_timezone(
  env_value: Option<&str>,
  configured: Option<&str>
) -> anyhow::Result<Tz> {
  let sources = [
    (TIMEZONE_ENV_VAR, env_value),
    ("config", configured)
  ];

  for (source, raw) in sources {
    let Some(raw) = raw else {
      continue;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      continue;
    }
    let tz = trimmed
      .parse::<Tz>()
      .map_err(|err| {
        anyhow!(
          "invalid timezone {trimmed:?} \
           from {source}: {err}"
        )
      })?;
    info!(
      source,
      timezone = %tz,
      "configured calendar timezone"
    );
    return Ok(tz);
  }

  Ok(chrono_tz::UTC)
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn reads_toml_and_sanitizes() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "timezone = \"Europe/Berlin\"\n\n[calendar]\ndefault_view = \"fortnight\"\nfade_past_events = true\n"
    )
    .expect("write config");

    let cfg = Config::load(Some(path.as_path()))
      .expect("load config");
    assert_eq!(cfg.loaded_files, vec![path]);
    assert_eq!(cfg.calendar.default_view, "month");
    assert!(cfg.calendar.fade_past_events);
    assert!(cfg.calendar.color);
    assert_eq!(
      resolve_timezone(None, cfg.timezone.as_deref())
        .expect("timezone"),
      chrono_tz::Europe::Berlin
    );
  }

  #[test]
  fn malformed_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "timezone = [").expect("write config");
    let err = Config::load_file(&path)
      .expect_err("parse should fail");
    assert!(format!("{err:#}").contains("failed to parse"));
  }

  #[test]
  fn overrides_replace_values() {
    let mut cfg = Config::default();
    cfg
      .apply_overrides(vec![
        ("rc.calendar.default_view".to_string(), "week".to_string()),
        ("calendar.fade_past_events".to_string(), "yes".to_string()),
        ("timezone".to_string(), "Asia/Tokyo".to_string()),
        ("nonsense".to_string(), "1".to_string())
      ])
      .expect("apply overrides");

    assert_eq!(cfg.calendar.default_view, "week");
    assert!(cfg.calendar.fade_past_events);
    assert_eq!(cfg.timezone.as_deref(), Some("Asia/Tokyo"));

    let err = cfg.apply_overrides(vec![(
      "calendar.color".to_string(),
      "maybe".to_string()
    )]);
    assert!(err.is_err());
  }

  #[test]
  fn config_path_precedence() {
    let dir = tempdir().expect("tempdir");
    let explicit = dir.path().join("explicit.toml");

    assert_eq!(
      resolve_config_path(Some(explicit.as_path()), Some("/tmp/env.toml"), None),
      Some(explicit.clone())
    );
    assert_eq!(
      resolve_config_path(None, Some("/tmp/env.toml"), None),
      Some(PathBuf::from("/tmp/env.toml"))
    );
    assert_eq!(
      resolve_config_path(None, Some("/dev/null"), Some(dir.path())),
      None
    );
    assert_eq!(resolve_config_path(None, None, Some(dir.path())), None);

    let nested = dir.path().join(CONFIG_DIR_NAME);
    fs::create_dir_all(&nested).expect("create config dir");
    fs::write(nested.join(CONFIG_FILE_NAME), "").expect("write config");
    assert_eq!(
      resolve_config_path(None, None, Some(dir.path())),
      Some(nested.join(CONFIG_FILE_NAME))
    );
  }

  #[test]
  fn timezone_env_wins_and_bad_ids_fail() {
    assert_eq!(
      resolve_timezone(Some("Asia/Tokyo"), Some("Europe/Berlin"))
        .expect("timezone"),
      chrono_tz::Asia::Tokyo
    );
    assert_eq!(
      resolve_timezone(Some("  "), None).expect("timezone"),
      chrono_tz::UTC
    );
    assert!(resolve_timezone(None, Some("Mars/Olympus")).is_err());
  }
}
