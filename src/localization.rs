use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Language used when the user's language is not supported
pub const DEFAULT_LANGUAGE: &str = "en";

/// Embedded message resources, one per supported language
const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

lazy_static! {
    static ref LOCALIZATION_MANAGER: LocalizationManager = LocalizationManager::new()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to an empty localization manager");
            LocalizationManager::empty()
        });
}

/// Localization manager for the ordering bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            bundles.insert(language.to_string(), Self::create_bundle(&locale, source)?);
        }

        Ok(Self { bundles })
    }

    fn empty() -> Self {
        Self {
            bundles: HashMap::new(),
        }
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders the isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Resolve a language code such as `ru-RU` to a loaded bundle key
    fn resolve_language<'a>(&self, language: Option<&'a str>) -> &'a str {
        let primary = language
            .and_then(|code| code.split(['-', '_']).next())
            .unwrap_or(DEFAULT_LANGUAGE);
        if self.is_language_supported(primary) {
            primary
        } else {
            DEFAULT_LANGUAGE
        }
    }

    /// Get a localized message in the requested language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let language = self.resolve_language(Some(language));
        let Some(bundle) = self.bundles.get(language) else {
            return format!("Missing translation: {}", key);
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key, ?errors, "Localization formatting reported errors");
        }

        value.into_owned()
    }
}

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.is_language_supported(DEFAULT_LANGUAGE) {
        Ok(())
    } else {
        Err(anyhow!("Default language resources failed to load"))
    }
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    &LOCALIZATION_MANAGER
}

/// Localized message in the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    manager.get_message_in_language(key, manager.resolve_language(language_code), None)
}

/// Localized message with arguments in the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    manager.get_message_in_language(key, manager.resolve_language(language_code), Some(&args_map))
}
