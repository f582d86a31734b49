//! QueueConfig - 設定とフックの組み立て
//!
//! # 学習ポイント
//! - Builder パターン（フックの差し替え）
//! - 起動時検証（Fail-fast 設計、固定順序でのチェック）

use std::sync::Arc;

use serde_json::{Map, Value};

use super::handle::TaskHandle;
use super::hooks::Hooks;
use crate::domain::{ConfigError, QueueSettings, TaskEnvelope};
use crate::ports::IdentifierGenerator;

/// Function-valued options, in the order they are checked.
pub const CALLABLE_OPTIONS: [&str; 10] = [
    "identifier_generator",
    "on_put",
    "on_take",
    "on_success",
    "on_fail",
    "on_fatal",
    "on_delay",
    "on_attempts",
    "validate_task",
    "to_string",
];

/// Numeric options, in the order they are checked.
pub const SETTING_OPTIONS: [&str; 4] = [
    "default_delay",
    "delay_multiplier",
    "delay_threshold",
    "max_attempts",
];

/// Settings + hooks handed to [`QueueManager::attach`](super::QueueManager::attach).
///
/// # 使用例
/// ```ignore
/// let config = QueueConfig::from_value(&json!({"max_attempts": 3}))?
///     .validate_task(|data| match data.get("job") {
///         Some(_) => Ok(()),
///         None => Err("missing job".to_string()),
///     })
///     .on_fatal(|task, err| alert(task.identifier(), err));
/// ```
///
/// # Fail-fast 設計
/// - 構造化されたドキュメント（JSON object）以外は拒否
/// - 関数であるべきオプションに値が入っていれば拒否（CALLABLE_OPTIONS の順）
/// - 数値オプションは QueueSettings::validate で検証
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    settings: QueueSettings,
    hooks: Hooks,
}

impl QueueConfig {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            hooks: Hooks::default(),
        }
    }

    /// Build a config from a JSON document.
    ///
    /// Unknown keys are ignored. `null` counts as "not set".
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or(ConfigError::NotAnObject)?;

        for key in CALLABLE_OPTIONS {
            if object.get(key).is_some_and(|v| !v.is_null()) {
                return Err(ConfigError::NotCallable(key));
            }
        }

        // 1 キーずつ QueueSettings として読み、失敗したオプション名を返す
        let mut document = Map::new();
        for key in SETTING_OPTIONS {
            let Some(value) = object.get(key).filter(|v| !v.is_null()) else {
                continue;
            };
            document.insert(key.to_string(), value.clone());
            parse_settings(Map::from_iter([(key.to_string(), value.clone())]), key)?;
        }
        let settings = parse_settings(document, "settings")?;
        settings.validate()?;

        Ok(Self::new(settings))
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn into_parts(self) -> (QueueSettings, Hooks) {
        (self.settings, self.hooks)
    }

    pub fn identifier_generator<G: IdentifierGenerator + 'static>(mut self, generator: G) -> Self {
        self.hooks.identifier_generator = Arc::new(generator);
        self
    }

    pub fn on_put<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskEnvelope, &str) + Send + Sync + 'static,
    {
        self.hooks.on_put = Arc::new(f);
        self
    }

    pub fn on_take<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskHandle) + Send + Sync + 'static,
    {
        self.hooks.on_take = Arc::new(f);
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskHandle, &str) + Send + Sync + 'static,
    {
        self.hooks.on_success = Arc::new(f);
        self
    }

    pub fn on_fail<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskHandle, &str) + Send + Sync + 'static,
    {
        self.hooks.on_fail = Arc::new(f);
        self
    }

    pub fn on_fatal<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskHandle, &str) + Send + Sync + 'static,
    {
        self.hooks.on_fatal = Arc::new(f);
        self
    }

    pub fn on_delay<F>(mut self, f: F) -> Self
    where
        F: Fn(&QueueSettings, &mut TaskEnvelope) + Send + Sync + 'static,
    {
        self.hooks.on_delay = Arc::new(f);
        self
    }

    pub fn on_attempts<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TaskEnvelope) + Send + Sync + 'static,
    {
        self.hooks.on_attempts = Arc::new(f);
        self
    }

    pub fn validate_task<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.validate_task = Arc::new(f);
        self
    }

    pub fn to_string<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.hooks.to_string = Arc::new(f);
        self
    }
}

fn parse_settings(
    document: Map<String, Value>,
    option: &'static str,
) -> Result<QueueSettings, ConfigError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| ConfigError::InvalidOption {
        option,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn empty_object_gives_defaults() {
        let config = QueueConfig::from_value(&json!({})).unwrap();
        assert_eq!(config.settings(), &QueueSettings::default());
    }

    #[test]
    fn recognized_options_are_applied_and_unknown_ignored() {
        let config = QueueConfig::from_value(&json!({
            "default_delay": 1,
            "delay_multiplier": 2,
            "delay_threshold": 3600,
            "max_attempts": 3,
            "priority": "high",
        }))
        .unwrap();
        let s = config.settings();
        assert_eq!(s.default_delay, Duration::from_secs(1));
        assert_eq!(s.delay_multiplier, 2.0);
        assert_eq!(s.delay_threshold, Duration::from_secs(3600));
        assert_eq!(s.attempt_limit(), Some(3));
    }

    #[rstest]
    #[case(json!([1, 2]))]
    #[case(json!("max_attempts=3"))]
    #[case(json!(null))]
    fn non_objects_are_rejected(#[case] doc: Value) {
        assert!(matches!(
            QueueConfig::from_value(&doc),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn non_callable_hooks_fail_in_declared_order() {
        // to_string comes after on_take in CALLABLE_OPTIONS
        let doc = json!({"to_string": 1, "on_take": "log", "on_success": null});
        assert!(matches!(
            QueueConfig::from_value(&doc),
            Err(ConfigError::NotCallable("on_take"))
        ));

        let doc = json!({"validate_task": true});
        assert!(matches!(
            QueueConfig::from_value(&doc),
            Err(ConfigError::NotCallable("validate_task"))
        ));
    }

    #[rstest]
    #[case(json!({"default_delay": -1}), "default_delay")]
    #[case(json!({"delay_threshold": "soon"}), "delay_threshold")]
    #[case(json!({"max_attempts": 1.5}), "max_attempts")]
    #[case(json!({"delay_multiplier": 0.5}), "delay_multiplier")]
    fn bad_numbers_name_their_option(#[case] doc: Value, #[case] expected: &str) {
        match QueueConfig::from_value(&doc) {
            Err(ConfigError::InvalidOption { option, .. }) => assert_eq!(option, expected),
            other => panic!("expected InvalidOption, got {other:?}"),
        }
    }

    #[test]
    fn null_settings_keep_defaults() {
        let config = QueueConfig::from_value(&json!({
            "default_delay": null,
            "max_attempts": null,
        }))
        .unwrap();
        assert_eq!(config.settings(), &QueueSettings::default());
    }

    #[test]
    fn first_bad_number_in_declared_order_wins() {
        let doc = json!({"max_attempts": "many", "delay_threshold": -5});
        match QueueConfig::from_value(&doc) {
            Err(ConfigError::InvalidOption { option, .. }) => assert_eq!(option, "delay_threshold"),
            other => panic!("expected InvalidOption, got {other:?}"),
        }
    }

    #[test]
    fn document_matches_serialized_settings() {
        let settings = QueueSettings {
            default_delay: Duration::from_millis(250),
            delay_multiplier: 3.0,
            delay_threshold: Duration::from_secs(90),
            max_attempts: 7,
        };
        let doc = serde_json::to_value(&settings).unwrap();
        let config = QueueConfig::from_value(&doc).unwrap();
        assert_eq!(config.settings(), &settings);
    }

    #[test]
    fn builder_replaces_single_hooks() {
        let config = QueueConfig::default()
            .identifier_generator(|| "fixed".to_string())
            .validate_task(|data| {
                if data.is_object() {
                    Ok(())
                } else {
                    Err("expected an object".to_string())
                }
            });

        assert_eq!(config.hooks().identifier_generator.generate(), "fixed");
        assert!((config.hooks().validate_task)(&json!(1)).is_err());
        assert!((config.hooks().validate_task)(&json!({})).is_ok());
    }
}
