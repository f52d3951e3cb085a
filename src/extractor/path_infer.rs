//! Best-effort path inference for bare code blocks
//!
//! Only consulted when no explicit path annotation is present; explicit
//! paths always win. Identifier detection tries, in order: a framework
//! component name, a default-export name, a class/interface name, a function
//! name, then a package declaration, falling back to the literal `code`.

use once_cell::sync::Lazy;
use regex::Regex;

static COMPONENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:default\s+)?(?:function|const)\s+([A-Z][A-Za-z0-9_]*)")
        .unwrap()
});
static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+default\s+(?:function\s+|class\s+)?([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static CLASS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:class|interface|struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:^|\s)(?:fn|function|def)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^package\s+([A-Za-z_][A-Za-z0-9_.]*)").unwrap()
});

/// Markup-like token inside a script block (a JSX/TSX-style element).
static MARKUP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Za-z][A-Za-z0-9]*(?:\s[^>]*)?>|</[A-Za-z]").unwrap());

static IMPORT_STMT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:import\s|use\s|from\s+\S+\s+import)").unwrap());
static EXPORT_STMT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:export\s|pub\s)").unwrap());

/// Infer a destination path for a block with no explicit annotation.
pub fn infer_path(language: &str, content: &str) -> String {
    let (identifier, component_shaped) = detect_identifier(content);
    let name = match identifier {
        Some(name) => name,
        None => {
            // ExtractionAmbiguous: heuristic fallback, never fatal.
            log::warn!(
                "[EXTRACT] No identifier inferable for a {} block; falling back to 'code'",
                language
            );
            "code".to_string()
        }
    };

    let extension = extension_for(language, content);
    let directory = directory_for(content, component_shaped);
    format!("{}/{}.{}", directory, to_kebab_case(&name), extension)
}

/// Try identifier patterns in decreasing specificity. The bool reports
/// whether the match came from the component pattern (used for directory
/// placement).
fn detect_identifier(content: &str) -> (Option<String>, bool) {
    if let Some(cap) = COMPONENT_NAME.captures(content) {
        return (Some(cap[1].to_string()), true);
    }
    if let Some(cap) = DEFAULT_EXPORT.captures(content) {
        return (Some(cap[1].to_string()), false);
    }
    if let Some(cap) = CLASS_NAME.captures(content) {
        return (Some(cap[1].to_string()), false);
    }
    if let Some(cap) = FUNCTION_NAME.captures(content) {
        return (Some(cap[1].to_string()), false);
    }
    if let Some(cap) = PACKAGE_NAME.captures(content) {
        // Packages are dotted; the last segment names the file.
        let last = cap[1].rsplit('.').next().unwrap_or("code").to_string();
        return (Some(last), false);
    }
    (None, false)
}

/// Fixed language -> extension table, with the templated-variant upgrade for
/// script languages whose content carries markup tokens.
fn extension_for(language: &str, content: &str) -> &'static str {
    let base = match language {
        "typescript" | "ts" => "ts",
        "tsx" => "tsx",
        "javascript" | "js" => "js",
        "jsx" => "jsx",
        "rust" | "rs" => "rs",
        "python" | "py" => "py",
        "ruby" | "rb" => "rb",
        "go" | "golang" => "go",
        "java" => "java",
        "kotlin" | "kt" => "kt",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "csharp" | "cs" => "cs",
        "swift" => "swift",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "vue" => "vue",
        "svelte" => "svelte",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "markdown" | "md" => "md",
        "sql" => "sql",
        "sh" | "bash" | "shell" => "sh",
        _ => "txt",
    };
    match base {
        "ts" if has_markup(content) => "tsx",
        "js" if has_markup(content) => "jsx",
        other => other,
    }
}

/// Destination directory from content shape: tests, then libraries, then
/// components, then the generic source directory.
fn directory_for(content: &str, component_shaped: bool) -> &'static str {
    if looks_like_test(content) {
        return "src/__tests__";
    }
    if IMPORT_STMT.is_match(content) && EXPORT_STMT.is_match(content) && !component_shaped {
        return "src/lib";
    }
    if component_shaped || has_markup(content) {
        return "src/components";
    }
    "src"
}

fn looks_like_test(content: &str) -> bool {
    content.contains("describe(")
        || content.contains("it(")
        || content.contains("test(")
        || content.contains("#[test]")
        || content.contains("def test_")
}

fn has_markup(content: &str) -> bool {
    MARKUP_TOKEN.is_match(content)
}

/// CamelCase/PascalCase -> kebab-case.
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '_' || c == ' ' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}
