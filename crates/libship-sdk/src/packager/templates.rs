//! Embedded package templates
//!
//! Installer scripts and framework metadata live under `templates/` and are
//! compiled into the binary. `{{NAME}}` placeholders are substituted at
//! render time and any placeholder left over is an error.

use include_dir::{Dir, include_dir};
use std::path::Path;

use crate::types::ShipError;

static TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

pub const ANDROID_INSTALL: &str = "android/install.sh";
pub const IOS_INSTALL: &str = "ios/install.sh";
pub const IOS_INFO_PLIST: &str = "ios/Info.plist";
pub const IOS_MODULE_MAP: &str = "ios/module.modulemap";

/// Template variable for substitution.
#[derive(Debug, Clone)]
pub struct TemplateVar {
    pub name: &'static str,
    pub value: String,
}

impl TemplateVar {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Renders the embedded template at `path` with `vars`.
pub fn render(path: &str, vars: &[TemplateVar]) -> Result<String, ShipError> {
    let file = TEMPLATES
        .get_file(path)
        .ok_or_else(|| ShipError::Template(format!("embedded template {} not found", path)))?;
    let text = file
        .contents_utf8()
        .ok_or_else(|| ShipError::Template(format!("embedded template {} is not UTF-8", path)))?;
    let rendered = render_template(text, vars);
    validate_no_unreplaced_placeholders(&rendered, Path::new(path))?;
    Ok(rendered)
}

fn render_template(input: &str, vars: &[TemplateVar]) -> String {
    let mut output = input.to_string();
    for var in vars {
        output = output.replace(&format!("{{{{{}}}}}", var.name), &var.value);
    }
    output
}

fn validate_no_unreplaced_placeholders(content: &str, file_path: &Path) -> Result<(), ShipError> {
    let mut pos = 0;
    let mut unreplaced = Vec::new();

    while let Some(start) = content[pos..].find("{{") {
        let abs_start = pos + start;
        let Some(end) = content[abs_start..].find("}}") else {
            break;
        };
        let var_name = &content[abs_start + 2..abs_start + end];
        // Names with `$` or spaces are not placeholders.
        if !var_name.is_empty() && !var_name.contains('$') && !var_name.contains(' ') {
            unreplaced.push(format!("{{{{{}}}}}", var_name));
        }
        pos = abs_start + end + 2;
    }

    if !unreplaced.is_empty() {
        return Err(ShipError::Template(format!(
            "unreplaced placeholders in {:?}: {:?}",
            file_path, unreplaced
        )));
    }
    Ok(())
}

/// Escapes the five XML special characters.
///
/// ```
/// use libship_sdk::packager::templates::xml_escape;
///
/// assert_eq!(xml_escape("R&D <beta>"), "R&amp;D &lt;beta&gt;");
/// ```
pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
