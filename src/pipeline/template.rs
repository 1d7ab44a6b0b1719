//! Template substitution: [`NormalizedResume`] → page-description markup.
//!
//! Both variants are compiled into one handlebars registry at startup. The
//! render context is the résumé serialised with its wire names, plus an
//! `assets` object carrying the absolute paths of registered resources.
//!
//! Element content follows the `escape` flag: verbatim by default, so field
//! values containing markup are interpreted as markup. The `attr` helper
//! always escapes and is meant for attribute values (`{{{attr name}}}`).

use crate::assets::AssetRefs;
use crate::error::ResumeError;
use crate::model::Variant;
use crate::pipeline::dates::NormalizedResume;
use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

const EXPERIENCED: &str = include_str!("../../templates/experienced.hbs");
const FRESHER: &str = include_str!("../../templates/fresher.hbs");

handlebars_helper!(attr: |value: str| xml_escape(value));

/// Escape the five XML special characters.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Compiled templates for both variants.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.registry.get_templates().keys().collect();
        names.sort();
        f.debug_struct("TemplateRenderer")
            .field("templates", &names)
            .finish()
    }
}

impl TemplateRenderer {
    /// Compile the built-in templates, replacing each with
    /// `<template_dir>/<variant>.hbs` when that file exists.
    pub fn new(template_dir: Option<&Path>, escape: bool) -> Result<Self, ResumeError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_helper("attr", Box::new(attr));
        if escape {
            registry.register_escape_fn(xml_escape);
        } else {
            registry.register_escape_fn(no_escape);
        }

        for variant in Variant::ALL {
            let name = variant.template_name();
            let builtin = match variant {
                Variant::Experienced => EXPERIENCED,
                Variant::Fresher => FRESHER,
            };
            let override_path = template_dir.map(|dir| dir.join(format!("{name}.hbs")));

            match override_path.filter(|p| p.is_file()) {
                Some(path) => {
                    let source =
                        std::fs::read_to_string(&path).map_err(|e| ResumeError::ResourceLoad {
                            path: path.clone(),
                            source: e,
                        })?;
                    registry
                        .register_template_string(name, source)
                        .map_err(|e| ResumeError::InvalidResource {
                            path: path.clone(),
                            detail: e.to_string(),
                        })?;
                    info!("Template '{}' loaded from {}", name, path.display());
                }
                None => {
                    registry
                        .register_template_string(name, builtin)
                        .map_err(|e| ResumeError::Internal(format!("built-in template '{name}': {e}")))?;
                }
            }
        }

        Ok(Self { registry })
    }

    /// Substitute `data` into the template for `variant`.
    pub fn render(
        &self,
        data: &NormalizedResume,
        variant: Variant,
        assets: &AssetRefs,
    ) -> Result<String, ResumeError> {
        let failed = |detail: String| ResumeError::TemplateFailed { variant, detail };

        let mut context = serde_json::to_value(data).map_err(|e| failed(e.to_string()))?;
        let assets = serde_json::to_value(assets).map_err(|e| failed(e.to_string()))?;
        match &mut context {
            Value::Object(map) => {
                map.insert("assets".to_string(), assets);
            }
            _ => return Err(failed("résumé did not serialise to an object".into())),
        }

        let markup = self
            .registry
            .render(variant.template_name(), &context)
            .map_err(|e| failed(e.to_string()))?;
        debug!("Template '{}' rendered {} bytes", variant, markup.len());
        Ok(markup)
    }
}
