//! Expands selected settings into a system-prompt prefix, grouped by
//! category and rendered through either a default template or a minimal
//! Handlebars `{{#each items}}` template — the same renderer the
//! `template_handlebars` block wraps behind a `TemplateRenderer` trait.

use std::collections::BTreeMap;

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub id: String,
    pub category: String,
    pub name: String,
    pub content: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingPromptTemplate {
    pub category: String,
    pub template: String,
    pub enabled: bool,
}

fn default_template(category_label: &str) -> String {
    format!("【{category_label}】\n{{{{items}}}}")
}

fn render_each_items(template: &str, settings: &[&Setting]) -> Option<String> {
    let start_marker = "{{#each items}}";
    let end_marker = "{{/each}}";
    let start = template.find(start_marker)?;
    let inner_start = start + start_marker.len();
    let end = template[inner_start..].find(end_marker)? + inner_start;
    let inner = &template[inner_start..end];

    let mut expanded = String::new();
    for setting in settings {
        let piece = inner
            .replace("{{name}}", &setting.name)
            .replace("{{content}}", &setting.content);
        expanded.push_str(&piece);
    }

    let mut out = String::with_capacity(template.len());
    out.push_str(&template[..start]);
    out.push_str(&expanded);
    out.push_str(&template[end + end_marker.len()..]);
    Some(out)
}

fn render_default_items(settings: &[&Setting]) -> String {
    settings
        .iter()
        .map(|s| format!("{}：{}", s.name, s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_category(template: &str, category_label: &str, settings: &[&Setting]) -> String {
    if template.contains("{{#each items}}") {
        if let Some(rendered) = render_each_items(template, settings) {
            return rendered;
        }
    }
    if template.contains("{{#") {
        // Some handlebars block syntax (conditionals, helpers, a non-literal
        // `#each` form) beyond the minimal subset above: hand off to the
        // real engine rather than treating it as a plain placeholder.
        return render_full_handlebars(template, settings);
    }
    let items = render_default_items(settings);
    if template.contains("{{items}}") {
        template.replace("{{items}}", &items)
    } else {
        // No recognizable placeholder at all: fall back to the default shape
        // rather than silently dropping the category's content.
        default_template(category_label).replace("{{items}}", &items)
    }
}

/// Renders a Handlebars template through the `handlebars` crate directly,
/// for templates that use syntax beyond the minimal subset above
/// (conditionals, helpers). Falls back to the literal template on error.
fn render_full_handlebars(template: &str, settings: &[&Setting]) -> String {
    let hb = Handlebars::new();
    let items: Vec<_> = settings
        .iter()
        .map(|s| json!({"name": s.name, "content": s.content}))
        .collect();
    hb.render_template(template, &json!({"items": items}))
        .unwrap_or_else(|_| template.to_string())
}

/// Filters to enabled + selected settings, groups by category, and renders
/// each category through its enabled prompt template (or the default),
/// concatenating the results with blank lines.
pub fn inject(
    selected_ids: &[String],
    library: &[Setting],
    prompt_templates: &[SettingPromptTemplate],
) -> String {
    let selected: std::collections::HashSet<&str> =
        selected_ids.iter().map(|s| s.as_str()).collect();

    let mut by_category: BTreeMap<&str, Vec<&Setting>> = BTreeMap::new();
    for setting in library {
        if setting.enabled && selected.contains(setting.id.as_str()) {
            by_category.entry(setting.category.as_str()).or_default().push(setting);
        }
    }

    let mut sections = Vec::new();
    for (category, settings) in by_category {
        let template = prompt_templates
            .iter()
            .find(|t| t.enabled && t.category == category)
            .map(|t| t.template.clone())
            .unwrap_or_else(|| default_template(category));
        sections.push(render_category(&template, category, &settings));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(id: &str, category: &str, name: &str, content: &str) -> Setting {
        Setting {
            id: id.into(),
            category: category.into(),
            name: name.into(),
            content: content.into(),
            enabled: true,
        }
    }

    #[test]
    fn default_template_joins_name_and_content() {
        let library = vec![setting("1", "character", "Ada", "a programmer")];
        let out = inject(&["1".to_string()], &library, &[]);
        assert!(out.contains("【character】"));
        assert!(out.contains("Ada：a programmer"));
    }

    #[test]
    fn each_items_template_expands_once_per_setting() {
        let library = vec![
            setting("1", "character", "Ada", "a programmer"),
            setting("2", "character", "Bob", "a writer"),
        ];
        let templates = vec![SettingPromptTemplate {
            category: "character".into(),
            template: "Cast:\n{{#each items}}- {{name}}: {{content}}\n{{/each}}".into(),
            enabled: true,
        }];
        let out = inject(&["1".to_string(), "2".to_string()], &library, &templates);
        assert!(out.contains("- Ada: a programmer\n"));
        assert!(out.contains("- Bob: a writer\n"));
    }

    #[test]
    fn disabled_settings_are_excluded() {
        let mut library = vec![setting("1", "character", "Ada", "a programmer")];
        library[0].enabled = false;
        let out = inject(&["1".to_string()], &library, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn unselected_settings_are_excluded() {
        let library = vec![setting("1", "character", "Ada", "a programmer")];
        let out = inject(&[], &library, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn template_with_block_helper_falls_back_to_full_handlebars() {
        let library = vec![setting("1", "character", "Ada", "a programmer")];
        let templates = vec![SettingPromptTemplate {
            category: "character".into(),
            template: "{{#if items}}Cast present{{/if}}".into(),
            enabled: true,
        }];
        let out = inject(&["1".to_string()], &library, &templates);
        assert_eq!(out, "Cast present");
    }
}
